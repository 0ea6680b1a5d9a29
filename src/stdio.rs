// ABOUTME: Stdio transport: newline-delimited JSON-RPC on stdin, responses on stdout
// ABOUTME: Stops the bot when the input stream ends

use crate::mcp::{handle_text, McpState};
use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

/// Serve MCP over the process's stdin/stdout
pub async fn serve_stdio(state: &McpState) -> Result<()> {
    tracing::info!("MCP stdio transport ready");
    let result = serve_lines(state, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await;
    state.shutdown().await;
    result
}

/// Read requests line by line until EOF, writing one response line per request
pub async fn serve_lines<R, W>(state: &McpState, reader: R, mut writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let Some(response) = handle_text(state, line).await else {
            continue;
        };

        let mut out = serde_json::to_string(&response).context("Failed to encode response")?;
        out.push('\n');
        writer
            .write_all(out.as_bytes())
            .await
            .context("Failed to write stdout")?;
        writer.flush().await.context("Failed to flush stdout")?;
    }

    tracing::info!("stdin closed");
    Ok(())
}
