use ambit::{Context, TransactionResult, ValueKind, complex_type, props};

fn main() -> TransactionResult<()> {
    let ctx = Context::new();
    let person = complex_type!("Person" { "name": Simple, "age": Simple, "tags": Element });
    let tags = ctx.create_list(ValueKind::Simple, ["admin"])?;
    let alice = ctx.create_complex(&person, props! { "name" => "Alice", "tags" => tags })?;

    // Write some data in a transaction
    {
        let scope = ctx.enter()?;
        ctx.set(alice, "age", 30)?;
        ctx.push(tags, "reviewer")?;

        println!("Inside the transaction: {}", ctx.to_json(alice)?);
        println!(
            "Committed age so far:   {:?}",
            ctx.committed_value(alice, "age")?
        );
        scope.accept()?;
    }

    // Read the data back
    println!("After commit:           {}", ctx.to_json(alice)?);

    // Changes of a rejected transaction never become visible
    {
        let scope = ctx.enter()?;
        ctx.set(alice, "name", "Mallory")?;
        if let Err(e) = scope.reject(None) {
            println!("Rejected: {e}");
        }
    }
    println!("After reject:           {}", ctx.to_json(alice)?);

    Ok(())
}
