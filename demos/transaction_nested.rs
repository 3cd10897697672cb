use ambit::{Context, Reference, TransactionResult, complex_type, props};

fn main() -> TransactionResult<()> {
    let ctx = Context::new();
    let node = complex_type!("Node" { "label": Simple, "child": Element });
    let leaf = ctx.create_complex(&node, props! { "label" => "leaf" })?;
    let root = ctx.create_complex(&node, props! { "label" => "root" })?;

    let outer = ctx.enter()?;
    ctx.set(root, "label", "root (edited)")?;

    // A nested scope joins the outer transaction; accepting it does not commit
    {
        let inner = ctx.enter()?;
        println!("inner is root scope: {}", inner.is_root());
        ctx.set(root, "child", leaf)?;
        inner.accept()?;
    }
    println!(
        "leaf is held by {:?} (speculatively)",
        ctx.references(leaf)?
    );
    println!("committed child: {:?}", ctx.committed_value(root, "child")?);

    // Only the root scope commits
    outer.accept()?;
    assert_eq!(
        ctx.references(leaf)?,
        [Reference::property(root, "child")]
    );
    println!("committed child: {:?}", ctx.committed_value(root, "child")?);

    // Failing inside `using` rejects the whole transaction
    let result = ctx.enter()?.using(|_| {
        ctx.set(root, "label", "doomed")?;
        let _nested = ctx.enter()?;
        ctx.set(root, "no such property", 1)
    });
    println!("using failed with: {}", result.unwrap_err());
    println!("label is still: {:?}", ctx.get(root, "label")?);

    Ok(())
}
