// ABOUTME: Line-by-line streaming of a long-running remote command.
// ABOUTME: Backs `logs --follow`; the stream ends when the command exits or the channel closes.

use super::client::Session;
use crate::remote::{ExecError, LineStream};
use russh::client::Msg;
use russh::{Channel, ChannelMsg};
use std::collections::VecDeque;

/// Splits a byte stream into lines, holding back any trailing partial line.
#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    partial: Vec<u8>,
}

impl LineBuffer {
    pub(crate) fn push(&mut self, data: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in data {
            if byte == b'\n' {
                let mut line = std::mem::take(&mut self.partial);
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                lines.push(String::from_utf8_lossy(&line).into_owned());
            } else {
                self.partial.push(byte);
            }
        }
        lines
    }

    /// Whatever is left after the final newline.
    pub(crate) fn finish(&mut self) -> Option<String> {
        if self.partial.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.partial);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }
}

/// What has been read from an exec channel so far.
///
/// The stream ends on `Close`, or once both `Eof` and the exit status have
/// arrived. The server may send the status after `Eof`, so `Eof` alone is
/// not the end.
struct LineState {
    command: String,
    buffer: LineBuffer,
    pending: VecDeque<String>,
    stderr: Vec<u8>,
    failure: Option<ExecError>,
    eof: bool,
    exited: bool,
    finished: bool,
}

impl LineState {
    fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
            buffer: LineBuffer::default(),
            pending: VecDeque::new(),
            stderr: Vec::new(),
            failure: None,
            eof: false,
            exited: false,
            finished: false,
        }
    }

    /// The next item ready to yield without reading more from the channel.
    fn ready(&mut self) -> Option<Result<String, ExecError>> {
        if let Some(line) = self.pending.pop_front() {
            return Some(Ok(line));
        }
        if self.finished {
            return self.failure.take().map(Err);
        }
        None
    }

    /// Fold one channel message in. `None` means the channel is gone.
    fn apply(&mut self, msg: Option<ChannelMsg>) {
        match msg {
            Some(ChannelMsg::Data { data }) => {
                self.pending.extend(self.buffer.push(&data));
            }
            Some(ChannelMsg::ExtendedData { data, ext }) if ext == 1 => {
                self.stderr.extend_from_slice(&data);
            }
            Some(ChannelMsg::ExitStatus { exit_status }) => {
                if exit_status != 0 {
                    self.failure = Some(ExecError::NonZeroExit {
                        command: self.command.clone(),
                        code: exit_status,
                        stderr: String::from_utf8_lossy(&self.stderr).trim().to_string(),
                    });
                }
                self.exited = true;
                self.finished = self.eof;
            }
            Some(ChannelMsg::Eof) => {
                self.pending.extend(self.buffer.finish());
                self.eof = true;
                self.finished = self.exited;
            }
            Some(ChannelMsg::Close) | None => {
                self.pending.extend(self.buffer.finish());
                self.finished = true;
            }
            Some(_) => {}
        }
    }
}

struct ChannelLines {
    channel: Channel<Msg>,
    state: LineState,
}

impl ChannelLines {
    async fn next_line(&mut self) -> Option<Result<String, ExecError>> {
        loop {
            if let Some(item) = self.state.ready() {
                return Some(item);
            }
            if self.state.finished {
                return None;
            }
            let msg = self.channel.wait().await;
            self.state.apply(msg);
        }
    }
}

impl Session {
    /// Run `command` and yield its stdout lines as they arrive.
    ///
    /// Dropping the stream abandons the channel; disconnecting the session
    /// terminates the remote command.
    pub async fn stream_lines(&self, command: &str) -> Result<LineStream, ExecError> {
        tracing::debug!("streaming: {}", command);
        let channel = self.open_exec(command).await?;

        let lines = ChannelLines {
            channel,
            state: LineState::new(command),
        };

        Ok(Box::pin(futures::stream::unfold(lines, |mut lines| async move {
            lines.next_line().await.map(|item| (item, lines))
        })))
    }
}
