mod cli;

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;

use cli::{Cli, Command};
use tarpost::client::TransferClient;
use tarpost::filter::FileFilter;
use tarpost::logger::{Logger, StderrLogger};
use tarpost::server::TransferServer;

fn main() -> Result<()> {
    let args = Cli::parse();
    let logger: Arc<dyn Logger> = Arc::new(StderrLogger::new(args.verbose));

    match args.command {
        Command::Serve { bind } => {
            let server = TransferServer::bind(&bind, logger.clone())?;
            logger.info(&format!(
                "serving transfers on {} (process id {})",
                bind,
                std::process::id()
            ));
            server.run();
        }
        Command::Upload {
            server,
            local,
            remote,
            filefilter,
        } => {
            let filter = FileFilter::new(filefilter.as_deref())?;
            TransferClient::new(server, logger.clone()).upload(&local, &remote, &filter)?;
            logger.info(&format!("uploaded {} to {}", local.display(), remote));
        }
        Command::Download {
            server,
            remote,
            local,
            filefilter,
        } => {
            let filter = FileFilter::new(filefilter.as_deref())?;
            TransferClient::new(server, logger.clone()).download(&remote, &local, &filter)?;
            logger.info(&format!("downloaded {} to {}", remote, local.display()));
        }
        Command::Delete {
            server,
            remote,
            filefilter,
        } => {
            let filter = FileFilter::new(filefilter.as_deref())?;
            TransferClient::new(server, logger.clone()).delete(&remote, &filter)?;
            logger.info(&format!("deleted {remote}"));
        }
        Command::Move {
            server,
            remote,
            new_remote,
        } => {
            TransferClient::new(server, logger.clone()).rename(&remote, &new_remote)?;
            logger.info(&format!("moved {remote} to {new_remote}"));
        }
        Command::Stat { server, remote } => {
            let stat = TransferClient::new(server, logger).stat(&remote)?;
            println!("exists: {}", stat.exists);
            println!("is_dir: {}", stat.is_dir);
        }
    }
    Ok(())
}
