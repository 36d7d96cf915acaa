// SSH transport: interactive CLI session with privilege escalation
//
// Network operating systems expect a terminal, so the session opens a PTY shell
// and drives it by waiting for the prompt after every line it sends.

use async_trait::async_trait;
use russh::client;
use russh::{Channel, ChannelMsg};
use russh_keys::key::PublicKey;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::Instant;

use super::{DeviceEntry, DeviceOutput, DeviceTransport};
use crate::config::Credentials;
use crate::error::{AppError, AppResult};

struct SshHandler;

#[async_trait]
impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        // Lab devices are addressed by IP and regenerate keys on reload
        Ok(true)
    }
}

pub struct SshTransport {
    credentials: Credentials,
    timeout: Duration,
}

impl SshTransport {
    pub fn new(credentials: Credentials, timeout: Duration) -> Self {
        SshTransport {
            credentials,
            timeout,
        }
    }

    async fn connect(&self, host: &str, addr: SocketAddr) -> AppResult<client::Handle<SshHandler>> {
        let config = Arc::new(client::Config {
            inactivity_timeout: Some(self.timeout),
            ..Default::default()
        });

        let stream = tokio::time::timeout(self.timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| AppError::ConnectionTimeout(host.to_string()))??;

        let mut session = tokio::time::timeout(
            self.timeout,
            client::connect_stream(config, stream, SshHandler),
        )
        .await
        .map_err(|_| AppError::ConnectionTimeout(host.to_string()))?
        .map_err(|e| AppError::Ssh(format!("{}: {}", host, e)))?;

        let authenticated = session
            .authenticate_password(&self.credentials.username, &self.credentials.password)
            .await
            .map_err(|e| AppError::Ssh(format!("{}: {}", host, e)))?;

        if !authenticated {
            return Err(AppError::AuthenticationFailed(host.to_string()));
        }

        Ok(session)
    }
}

#[async_trait]
impl DeviceTransport for SshTransport {
    async fn fetch(
        &self,
        device: &DeviceEntry,
        addr: SocketAddr,
        command: &str,
    ) -> AppResult<DeviceOutput> {
        let host = device.address.as_str();
        let session = self.connect(host, addr).await?;
        tracing::info!("Connected to {} ({})", host, addr);

        let channel = session
            .channel_open_session()
            .await
            .map_err(|e| AppError::Ssh(format!("{}: {}", host, e)))?;
        let mut shell = Shell {
            channel,
            host: host.to_string(),
            timeout: self.timeout,
        };
        shell.start().await?;

        let mut prompt = shell.read_until_prompt().await?;
        if !is_privileged(&prompt) {
            prompt = shell.enable(&self.credentials.secret).await?;
        }
        let hostname = hostname_from_prompt(&prompt).to_string();

        shell.run("terminal length 0").await?;
        let output = shell.run(command).await?;
        let raw_output = clean_output(&output, command);

        tracing::debug!(
            "Console output for {} running command: {}\n\n{}",
            host,
            command,
            raw_output
        );

        if let Err(e) = session
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await
        {
            tracing::debug!("Disconnect from {} failed: {}", host, e);
        }

        Ok(DeviceOutput {
            hostname,
            raw_output,
        })
    }
}

/// An interactive shell channel on one device
struct Shell {
    channel: Channel<client::Msg>,
    host: String,
    timeout: Duration,
}

impl Shell {
    fn ssh_error(&self, e: russh::Error) -> AppError {
        AppError::Ssh(format!("{}: {}", self.host, e))
    }

    async fn start(&mut self) -> AppResult<()> {
        self.channel
            .request_pty(false, "vt100", 511, 24, 0, 0, &[])
            .await
            .map_err(|e| self.ssh_error(e))?;
        self.channel
            .request_shell(false)
            .await
            .map_err(|e| self.ssh_error(e))
    }

    async fn send_line(&mut self, line: &str) -> AppResult<()> {
        let data = format!("{}\n", line);
        self.channel
            .data(data.as_bytes())
            .await
            .map_err(|e| self.ssh_error(e))
    }

    /// Collect output until `done` accepts it or the timeout passes
    async fn read_until<F>(&mut self, done: F) -> AppResult<String>
    where
        F: Fn(&str) -> bool,
    {
        let deadline = Instant::now() + self.timeout;
        let mut buffer = Vec::new();

        loop {
            let text = String::from_utf8_lossy(&buffer).replace('\r', "");
            if done(&text) {
                return Ok(text);
            }

            let msg = tokio::time::timeout_at(deadline, self.channel.wait())
                .await
                .map_err(|_| AppError::ConnectionTimeout(self.host.clone()))?;
            match msg {
                Some(ChannelMsg::Data { data }) => buffer.extend_from_slice(&data),
                Some(ChannelMsg::ExtendedData { data, .. }) => buffer.extend_from_slice(&data),
                Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => {
                    return Err(AppError::Ssh(format!(
                        "{}: session closed by device",
                        self.host
                    )));
                }
                _ => {}
            }
        }
    }

    /// Wait for a prompt and return it
    async fn read_until_prompt(&mut self) -> AppResult<String> {
        let text = self.read_until(|text| find_prompt(text).is_some()).await?;
        Ok(find_prompt(&text).unwrap_or_default().to_string())
    }

    /// Send a line and return everything printed before the next prompt
    async fn run(&mut self, line: &str) -> AppResult<String> {
        self.send_line(line).await?;
        self.read_until(|text| find_prompt(text).is_some()).await
    }

    /// Enter privileged mode, returning the new prompt
    async fn enable(&mut self, secret: &str) -> AppResult<String> {
        self.send_line("enable").await?;
        let text = self
            .read_until(|text| is_password_prompt(text) || find_prompt(text).is_some())
            .await?;
        let text = if is_password_prompt(&text) {
            self.send_line(secret).await?;
            // A wrong secret is answered with another password prompt
            self.read_until(|text| is_password_prompt(text) || find_prompt(text).is_some())
                .await?
        } else {
            text
        };

        match find_prompt(&text) {
            Some(prompt) if is_privileged(prompt) => Ok(prompt.to_string()),
            _ => Err(AppError::PrivilegeEscalationFailed(self.host.clone())),
        }
    }
}

/// The prompt on the last line of `text`, e.g. "R1#" or "R1>"
pub fn find_prompt(text: &str) -> Option<&str> {
    let last = text.lines().last()?.trim();
    let is_prompt = (last.ends_with('#') || last.ends_with('>'))
        && last.len() > 1
        && !last.contains(char::is_whitespace);
    is_prompt.then_some(last)
}

pub fn is_privileged(prompt: &str) -> bool {
    prompt.ends_with('#')
}

fn is_password_prompt(text: &str) -> bool {
    text.lines()
        .last()
        .is_some_and(|line| line.trim().to_ascii_lowercase().ends_with("password:"))
}

/// Hostname is the prompt without its trailing mode character
pub fn hostname_from_prompt(prompt: &str) -> &str {
    prompt.trim_end_matches(['#', '>'])
}

/// Strip the echoed command line and the trailing prompt from a command's output
pub fn clean_output(output: &str, command: &str) -> String {
    let mut lines: Vec<&str> = output.lines().collect();

    if lines.first().is_some_and(|l| l.trim().ends_with(command.trim())) {
        lines.remove(0);
    }
    if lines.last().is_some_and(|l| find_prompt(l).is_some()) {
        lines.pop();
    }

    lines.join("\n")
}
