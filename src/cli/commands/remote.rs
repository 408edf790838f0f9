//! Push and fetch commands.

use anyhow::Result;

use super::{print_json, with_workspace};
use crate::cli::RemoteArgs;

/// Upload local bugs to the remote.
///
/// # Errors
///
/// Returns an error if the transport fails or the remote rejects an update.
pub fn push(args: &RemoteArgs, json: bool) -> Result<()> {
    with_workspace(|ws| {
        let remote = ws.remote(args.remote.as_deref());
        let transcript = ws.cache.push(&remote)?;
        report(&remote, &transcript, json)
    })
}

/// Download the remote's bugs without merging them.
///
/// # Errors
///
/// Returns an error if the transport fails.
pub fn fetch(args: &RemoteArgs, json: bool) -> Result<()> {
    with_workspace(|ws| {
        let remote = ws.remote(args.remote.as_deref());
        let transcript = ws.cache.fetch(&remote)?;
        report(&remote, &transcript, json)
    })
}

fn report(remote: &str, transcript: &str, json: bool) -> Result<()> {
    if json {
        print_json(&serde_json::json!({ "remote": remote, "transcript": transcript }))?;
    } else {
        println!("{}", transcript.trim_end());
    }
    Ok(())
}
