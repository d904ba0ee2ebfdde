//! `toolrelay tools`: list the tool descriptors sent to the model.

pub fn run(json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let registry = toolrelay_tools::default_registry();
    let definitions = registry.definitions();

    if json {
        println!("{}", serde_json::to_string_pretty(&definitions)?);
        return Ok(());
    }

    println!("🔧 {} tools", definitions.len());
    for def in &definitions {
        let required = def.parameters["required"]
            .as_array()
            .map(|r| r.iter().filter_map(|v| v.as_str()).collect::<Vec<_>>().join(", "))
            .unwrap_or_default();
        println!();
        println!("  {}", def.name);
        println!("    {}", def.description);
        if !required.is_empty() {
            println!("    required: {required}");
        }
    }
    Ok(())
}
