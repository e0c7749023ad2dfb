use anyhow::Result;
use glimpse_core::EngineConfig;
use glimpse_protocol::Engine;
use tracing::info;

/// Run the engine on stdin/stdout until the host shuts it down or closes
/// the input. Returns the exit code.
pub async fn serve(config: &EngineConfig) -> Result<i32> {
    let engine = Engine::stdio(config)?;
    engine.start()?;

    let code = engine.wait().await;
    engine.flush().await?;
    info!(code, "engine stopped");
    Ok(code)
}
