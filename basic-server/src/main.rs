//! Courier server and queue administration tool

mod config;

use clap::{Parser, Subcommand};
use std::process::ExitCode;
use std::time::Duration;

use courier::error::ClResult;
use courier::queue_adapter::{ListMessageOptions, MessageState};
use courier::types::MsgId;
use tracing::{error, info};

use crate::config::Config;

#[derive(Parser, Debug)]
#[command(name = "courier", about = "Outbound mail service", version)]
struct Cli {
	#[command(flatten)]
	config: Config,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Serve the render endpoint and the internal API
	Serve {
		#[arg(long, env = "COURIER_LISTEN", default_value = "127.0.0.1:8080")]
		listen: String,

		/// Run the delivery worker in the same process
		#[arg(long)]
		with_worker: bool,
	},
	/// Run the delivery worker until interrupted
	Worker,
	/// Deliver pending mails for a bounded time, then exit
	Cron {
		/// Seconds to keep working
		#[arg(long, env = "COURIER_CRON_BUDGET", default_value_t = 55)]
		budget: u64,
	},
	/// Queue a copy of an existing message
	Requeue { id: MsgId },
	/// List queued messages, newest first
	List {
		/// pending, sent or failed
		#[arg(long)]
		state: Option<MessageState>,

		#[arg(long, default_value_t = 50)]
		limit: u32,
	},
}

async fn run(cli: Cli) -> ClResult<()> {
	let config = cli.config;
	match cli.command {
		Command::Serve { listen, with_worker } => {
			config.builder(Some(listen.as_str())).await?.serve(with_worker).await
		}
		Command::Worker => {
			let report = config.builder(None).await?.run_worker().await?;
			info!("Worker done: {} sent, {} failed", report.sent, report.failed);
			Ok(())
		}
		Command::Cron { budget } => {
			let mut builder = config.builder(None).await?;
			builder.cron_budget(Duration::from_secs(budget));
			builder.run_cron().await?;
			Ok(())
		}
		Command::Requeue { id } => {
			let queue = config.queue_adapter().await?;
			let new_id = queue.requeue(id).await?;
			println!("{}", new_id);
			Ok(())
		}
		Command::List { state, limit } => {
			let queue = config.queue_adapter().await?;
			let messages = queue.list(&ListMessageOptions { state, limit: Some(limit) }).await?;
			for msg in messages {
				println!(
					"{}\t{}\t{}\t{}\t{}\t{}",
					msg.id,
					msg.state(),
					msg.created_at,
					msg.recipient,
					msg.subject,
					msg.error.as_deref().unwrap_or("")
				);
			}
			Ok(())
		}
	}
}

#[tokio::main]
async fn main() -> ExitCode {
	let cli = Cli::parse();
	match run(cli).await {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			error!("{}", e);
			eprintln!("courier: {}", e);
			ExitCode::FAILURE
		}
	}
}

// vim: ts=4
