use ambit::{Context, TransactionResult, TransactionScope, complex_type, props};

fn main() -> TransactionResult<()> {
    let ctx = Context::new();
    let doc = complex_type!("Document" { "title": Simple });
    let id = ctx.create_complex(&doc, props! { "title" => "draft" })?;

    // Alice starts editing, then steps away without committing
    let alice = {
        let scope = ctx.enter()?;
        ctx.set(id, "title", "Alice's title")?;
        scope.transaction()
    };

    // Meanwhile Bob commits a change to the same document
    {
        let bob = ctx.enter()?;
        ctx.set(id, "title", "Bob's title")?;
        bob.accept()?;
    }

    // When Alice comes back, her transaction is rejected with a conflict
    match TransactionScope::new(&ctx, alice.as_ref()) {
        Ok(_) => println!("no conflict"),
        Err(e) => println!("Alice: {e}"),
    }
    println!("title: {:?}", ctx.committed_value(id, "title")?);

    Ok(())
}
