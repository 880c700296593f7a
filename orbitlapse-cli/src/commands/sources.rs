//! Provider commands: `sources`, `status` and `switch`.

use orbitlapse::loader::ImageryLoader;
use orbitlapse::provider::{ProviderKind, ProviderStatus, ReqwestClient};

use crate::error::CliError;

/// List every provider and whether it can be used.
pub fn run_sources(loader: &ImageryLoader<ReqwestClient>) -> Result<(), CliError> {
    let active = loader.active();

    println!("Imagery Sources");
    println!("===============");
    println!();
    for source in loader.get_available_sources() {
        let marker = if source.id == active { "*" } else { " " };
        let availability = if source.available {
            "available"
        } else {
            "unavailable"
        };
        let auth = if source.requires_auth {
            ", auth required"
        } else {
            ""
        };
        println!(
            "{} {:<7} {:<20} [{}{}]",
            marker,
            source.id.id(),
            source.name,
            availability,
            auth
        );
        println!("          {}", source.description);
    }
    println!();
    println!("* active source");
    Ok(())
}

/// Show the active provider.
pub fn run_status(loader: &ImageryLoader<ReqwestClient>) -> Result<(), CliError> {
    let info = loader.current_source();
    let state = loader.state();

    println!("Active source:  {} ({})", info.source_name, info.source);
    println!("Data directory: {}", info.data_directory.display());
    match &info.status {
        ProviderStatus::Ready => println!("Status:         ready"),
        ProviderStatus::Unavailable { reason } => {
            println!("Status:         unavailable");
            println!("                {}", reason);
        }
    }
    println!("Last switched:  {}", state.last_updated.to_rfc3339());
    println!();
    println!("{}", state.warning);
    Ok(())
}

/// Make another provider active.
pub fn run_switch(
    loader: &mut ImageryLoader<ReqwestClient>,
    kind: ProviderKind,
) -> Result<(), CliError> {
    let previous = loader.active();
    loader.switch(kind)?;
    let info = loader.current_source();

    if previous == kind {
        println!("Restarted {} with a fresh session", info.source_name);
    } else {
        println!("Switched from {} to {}", previous.label(), info.source_name);
    }
    println!("Images are stored in {}", info.data_directory.display());
    if let ProviderStatus::Unavailable { reason } = &info.status {
        println!();
        println!("Warning: {} is not ready: {}", info.source_name, reason);
    }
    Ok(())
}
