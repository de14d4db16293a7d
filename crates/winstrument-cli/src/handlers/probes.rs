use crate::context::ExecutionContext;
use crate::presentation::views;
use anyhow::Result;

pub fn handle_list(ctx: &ExecutionContext) -> Result<()> {
    let registry = ctx.registry();
    views::print_probe_list(registry.descriptors(), ctx.color());
    Ok(())
}

pub fn handle_info(ctx: &ExecutionContext, probe: Option<&str>) -> Result<()> {
    let registry = ctx.registry();

    let Some(name) = probe else {
        views::print_probe_info(registry.descriptors(), ctx.color());
        return Ok(());
    };

    let descriptor = registry
        .descriptor(name)
        .ok_or_else(|| anyhow::anyhow!("Unknown probe: {}", name))?;
    if descriptor.description.is_empty() {
        anyhow::bail!("No description for probe {}", name);
    }
    println!("{}", descriptor.description);
    Ok(())
}
