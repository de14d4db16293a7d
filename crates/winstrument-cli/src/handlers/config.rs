use crate::context::ExecutionContext;
use anyhow::Result;

pub fn handle_get(ctx: &ExecutionContext, namespace: &str, key: &str) -> Result<()> {
    let db = ctx.db()?;
    let settings = ctx.settings(&db);

    match settings.get(namespace, key) {
        Some(value) => println!("{}={}", key, value),
        None => anyhow::bail!("No setting {}.{}", namespace, key),
    }
    Ok(())
}

/// Settings are saved immediately; there is no session to quit from.
pub fn handle_set(ctx: &ExecutionContext, namespace: &str, key: &str, value: String) -> Result<()> {
    let db = ctx.db()?;
    let mut settings = ctx.settings(&db);

    settings.set(namespace, key, value);
    settings.save(&db)?;
    Ok(())
}

pub fn handle_list(ctx: &ExecutionContext, namespace: &str) -> Result<()> {
    let db = ctx.db()?;
    let settings = ctx.settings(&db);

    for (key, value) in settings.namespace(namespace) {
        println!("{}={}", key, value);
    }
    Ok(())
}
