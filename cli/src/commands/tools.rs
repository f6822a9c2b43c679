use anyhow::{Context, Result, bail};
use serde_json::Value;
use tabled::{
    Table, Tabled,
    settings::{Style, Width, object::Columns, Modify},
};

use sous_core::context::ExecutionContext;
use sous_core::service::SousService;

use super::helpers::truncate;

pub(crate) fn cmd_tools(service: &SousService, json: bool) -> Result<()> {
    let defs = service.tool_definitions();

    if json {
        println!("{}", serde_json::to_string_pretty(&defs)?);
        return Ok(());
    }

    #[derive(Tabled)]
    struct ToolRow {
        #[tabled(rename = "Tool")]
        name: &'static str,
        #[tabled(rename = "Operations")]
        operations: String,
        #[tabled(rename = "Description")]
        description: String,
    }

    let rows: Vec<ToolRow> = defs
        .iter()
        .map(|d| ToolRow {
            name: d.name,
            operations: d.operations.join(", "),
            description: truncate(d.description, 60),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::single(1)).with(Width::wrap(40)))
        .to_string();
    println!("{table}");
    Ok(())
}

/// Invoke a tool with raw JSON arguments and print its result.
pub(crate) fn cmd_call(
    service: &SousService,
    ctx: &ExecutionContext,
    tool: &str,
    args: &str,
) -> Result<()> {
    let args: Value = serde_json::from_str(args)
        .with_context(|| format!("Invalid --args JSON for tool '{tool}'"))?;
    if !args.is_object() {
        bail!("--args must be a JSON object");
    }

    let result = service.invoke_with(tool, args, ctx)?;
    println!("{}", serde_json::to_string_pretty(&result)?);

    if result["success"] == false {
        bail!(
            "{}",
            result["error"].as_str().unwrap_or("tool call failed")
        );
    }
    Ok(())
}
