//! Magpie REPL：读一行、跑一轮、打印响应
//!
//! 命令：:reset 清推理状态；:meta <handle> 附加产物句柄；:quit 退出。
//! 无 OPENAI_API_KEY 时自动退回 Mock LLM，循环仍可离线演示。

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};

use magpie::config::load_config;
use magpie::{observability, Agent};

#[tokio::main]
async fn main() -> Result<()> {
    observability::init();

    let cfg = load_config(None).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        magpie::config::AppConfig::default()
    });
    let mut agent = Agent::new(&cfg)?;
    let mut chat_history: Vec<(String, String)> = Vec::new();

    println!("magpie ready. :reset / :meta <handle> / :quit");
    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        match input {
            ":quit" => break,
            ":reset" => {
                agent.reset();
                println!("(reasoning state cleared; attachments kept)");
                continue;
            }
            _ if input.starts_with(":meta ") => {
                let handle = input.trim_start_matches(":meta ").trim();
                agent.attach_meta(handle);
                println!("(attached {handle})");
                continue;
            }
            _ => {}
        }

        match agent.run(input, &chat_history, true).await {
            Ok(response) => {
                println!("{response}");
                chat_history.push((input.to_string(), response));
            }
            Err(e) => {
                tracing::error!(error = %e, "turn failed");
                println!("(error: {e})");
            }
        }
    }

    Ok(())
}
