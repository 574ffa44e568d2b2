//! claimflow 命令行入口
//!
//! 用法：`claimflow [--config <file>] [--document <file>] <request...>`
//! 逐行以 JSON 打印进度事件，最后打印最终回复。Ctrl+C 取消尚未开始的步骤。

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use claimflow::core::{create_orchestrator_builder, WorkflowRequest};
use claimflow::observability;

#[derive(Parser, Debug)]
#[command(name = "claimflow")]
#[command(about = "Run a multi-step tool workflow for a natural-language request")]
struct Cli {
    /// Config file (defaults to config/default.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Document whose text is passed to document-aware tools
    #[arg(short, long)]
    document: Option<PathBuf>,

    /// The request text
    request: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 日志：默认 info，可通过 RUST_LOG 覆盖；输出到 stderr，stdout 只留事件与回复
    observability::init("claimflow=info");

    let args = Cli::parse();
    let document = match &args.document {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read document {}", path.display()))?,
        None => String::new(),
    };

    let builder = create_orchestrator_builder(args.config);
    let directory = builder.config().tools.tool_directory();
    let orchestrator = Arc::new(builder.build().context("Failed to build orchestrator")?);

    let request = WorkflowRequest::new(args.request.join(" "), directory).with_document(document);
    let mut job = orchestrator.spawn(request);

    let cancel = job.cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Ctrl+C received, cancelling remaining steps");
            cancel.cancel();
        }
    });

    while let Some(event) = job.events.recv().await {
        println!("{}", event.to_json());
    }

    let response = job.handle.await.context("Workflow task panicked")?;
    println!();
    println!("{}", response.final_response);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn test_request_words_and_flags() {
        let cli = Cli::try_parse_from(["claimflow", "-d", "disclosure.txt", "draft", "claims"]).unwrap();
        assert_eq!(cli.document, Some(PathBuf::from("disclosure.txt")));
        assert!(cli.config.is_none());
        assert_eq!(cli.request.join(" "), "draft claims");
    }

    #[test]
    fn test_help_is_not_a_failure() {
        let err = Cli::try_parse_from(["claimflow", "--help"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        assert_eq!(err.exit_code(), 0);
    }

    #[test]
    fn test_flag_without_value_is_rejected() {
        let err = Cli::try_parse_from(["claimflow", "draft", "claims", "--config"]).unwrap_err();
        assert_ne!(err.kind(), ErrorKind::DisplayHelp);
        assert_eq!(err.exit_code(), 2);
    }
}
