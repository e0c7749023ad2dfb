use anyhow::Result;
use glimpse_core::EngineConfig;
use glimpse_protocol::{advertised_capabilities, default_factory};

pub fn list_capabilities(config: &EngineConfig, json: bool) -> Result<()> {
    let factory = default_factory(config);
    let capabilities = advertised_capabilities(factory.as_ref());

    if json {
        println!("{}", serde_json::to_string_pretty(&capabilities)?);
    } else {
        for capability in capabilities.iter() {
            println!("{capability}");
        }
    }
    Ok(())
}
