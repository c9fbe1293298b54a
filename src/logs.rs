// ABOUTME: Remote log tailing for `skiff logs`, one-shot or following.
// ABOUTME: Following ends on a stop signal or stream end; the session is closed either way.

use futures::StreamExt;
use std::future::Future;
use thiserror::Error;

use crate::config::ServerProfile;
use crate::remote::{ConnectError, ExecError, RemoteSession, SessionFactory, quote};

pub const DEFAULT_LINES: usize = 50;

#[derive(Debug, Error)]
pub enum LogsError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("failed to read log: {0}")]
    Exec(#[from] ExecError),
}

/// `tail` invocation for `path`. `-F` keeps following across log rotation.
pub fn tail_command(path: &str, lines: usize, follow: bool) -> String {
    if follow {
        format!("tail -n {lines} -F {}", quote(path))
    } else {
        format!("tail -n {lines} {}", quote(path))
    }
}

/// Last `lines` lines of the profile's log file.
pub async fn recent(
    sessions: &dyn SessionFactory,
    profile: &ServerProfile,
    lines: usize,
) -> Result<Vec<String>, LogsError> {
    let session = sessions.create(profile);
    session.connect().await?;
    let result = session
        .execute(&tail_command(&profile.log_file(), lines, false), None)
        .await;
    session.disconnect().await;

    Ok(result?.lines().map(str::to_string).collect())
}

/// Stream the log to `on_line` until `stop` resolves or the remote side ends the stream.
pub async fn follow<S>(
    sessions: &dyn SessionFactory,
    profile: &ServerProfile,
    lines: usize,
    on_line: impl FnMut(&str),
    stop: S,
) -> Result<(), LogsError>
where
    S: Future<Output = ()>,
{
    let session = sessions.create(profile);
    session.connect().await?;

    let command = tail_command(&profile.log_file(), lines, true);
    let result = pump(session.as_ref(), &command, on_line, stop).await;
    session.disconnect().await;
    result
}

async fn pump<S>(
    session: &dyn RemoteSession,
    command: &str,
    mut on_line: impl FnMut(&str),
    stop: S,
) -> Result<(), LogsError>
where
    S: Future<Output = ()>,
{
    let mut stream = session.stream_lines(command).await?;
    tokio::pin!(stop);

    loop {
        tokio::select! {
            _ = &mut stop => {
                tracing::info!("log follow stopped");
                return Ok(());
            }
            next = stream.next() => match next {
                Some(Ok(line)) => on_line(&line),
                Some(Err(e)) => return Err(e.into()),
                None => {
                    tracing::info!("log stream ended");
                    return Ok(());
                }
            },
        }
    }
}
