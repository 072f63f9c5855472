//! SSH transport. Implements `SessionConnector` and `RemoteSession` on
//! top of libssh2.
//!
//! libssh2 is blocking; every call runs on tokio's blocking pool with a
//! clone of the session handle.

use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ssh2::Session;
use tracing::{debug, trace};

use crate::application::ports::{CommandOutput, RemoteSession, RunOptions, SessionConnector};
use crate::domain::{AuthMethod, ConnectionContext, SessionError};

/// Opens libssh2 sessions.
#[derive(Debug, Default)]
pub struct Ssh2Connector;

/// An authenticated libssh2 session bound to one connection context.
pub struct Ssh2Session {
    session: Session,
    ctx: ConnectionContext,
}

impl SessionConnector for Ssh2Connector {
    type Session = Ssh2Session;

    async fn connect(&self, ctx: &ConnectionContext) -> Result<Ssh2Session> {
        let owned = ctx.clone();
        let session = tokio::task::spawn_blocking(move || open_session(&owned))
            .await
            .context("spawn_blocking for ssh connect")??;
        debug!(host = %ctx.host, user = %ctx.user, context = ctx.kind.label(), "ssh session open");
        Ok(Ssh2Session {
            session,
            ctx: ctx.clone(),
        })
    }
}

fn open_session(ctx: &ConnectionContext) -> Result<Session> {
    let address = ctx.address();
    let connect_err = |reason: String| SessionError::Connect {
        host: address.clone(),
        reason,
    };
    let addr = address
        .to_socket_addrs()
        .map_err(|e| connect_err(e.to_string()))?
        .next()
        .ok_or_else(|| connect_err("host did not resolve".into()))?;
    let tcp = TcpStream::connect_timeout(&addr, ctx.connect_timeout)
        .map_err(|e| connect_err(e.to_string()))?;

    let mut session = Session::new().map_err(transport)?;
    session.set_timeout(timeout_ms(ctx));
    session.set_tcp_stream(tcp);
    session
        .handshake()
        .map_err(|e| connect_err(format!("ssh handshake failed: {e}")))?;

    let allowed: Vec<String> = session
        .auth_methods(&ctx.user)
        .map_err(transport)?
        .split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(String::from)
        .collect();
    let attempted = ctx.auth.ssh_name();
    if !allowed.iter().any(|m| m == attempted) {
        return Err(SessionError::AuthenticationKindMismatch {
            host: ctx.host.clone(),
            user: ctx.user.clone(),
            attempted: attempted.to_string(),
            allowed,
        }
        .into());
    }

    let auth = match &ctx.auth {
        AuthMethod::Password(password) => session.userauth_password(&ctx.user, password.expose()),
        AuthMethod::PublicKey { private_key } => {
            let public_key = public_key_for(private_key);
            session.userauth_pubkey_file(
                &ctx.user,
                public_key.is_file().then_some(public_key.as_path()),
                private_key,
                None,
            )
        }
    };
    if auth.is_err() || !session.authenticated() {
        return Err(SessionError::AuthenticationFailed {
            host: ctx.host.clone(),
            user: ctx.user.clone(),
        }
        .into());
    }
    // Installers can run for minutes; only the handshake is bounded.
    session.set_timeout(0);
    Ok(session)
}

fn public_key_for(private_key: &Path) -> PathBuf {
    let mut name = private_key.as_os_str().to_os_string();
    name.push(".pub");
    PathBuf::from(name)
}

fn timeout_ms(ctx: &ConnectionContext) -> u32 {
    u32::try_from(ctx.connect_timeout.as_millis()).unwrap_or(u32::MAX)
}

fn transport(err: ssh2::Error) -> SessionError {
    SessionError::Transport(err.to_string())
}

fn exec_blocking(session: &Session, command: &str, stdin: Option<&str>) -> Result<CommandOutput> {
    let mut channel = session.channel_session().map_err(transport)?;
    channel.exec(command).map_err(transport)?;
    if let Some(input) = stdin {
        channel
            .write_all(format!("{input}\n").as_bytes())
            .map_err(|e| SessionError::Transport(e.to_string()))?;
    }
    channel.send_eof().map_err(transport)?;

    let stdout = read_lossy(&mut channel)?;
    let stderr = read_lossy(&mut channel.stderr())?;
    channel.wait_close().map_err(transport)?;
    let code = channel.exit_status().map_err(transport)?;
    Ok(CommandOutput::new(code, stdout, stderr))
}

/// Drains `reader`; bytes that are not UTF-8 are replaced, never an error.
fn read_lossy(reader: &mut impl Read) -> Result<String, SessionError> {
    let mut buf = Vec::new();
    reader
        .read_to_end(&mut buf)
        .map_err(|e| SessionError::Transport(e.to_string()))?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn upload_blocking(session: &Session, local: &Path, remote: &str) -> Result<()> {
    let content =
        std::fs::read(local).with_context(|| format!("cannot read {}", local.display()))?;
    let sftp = session.sftp().map_err(transport)?;
    let mut file = sftp.create(Path::new(remote)).map_err(transport)?;
    file.write_all(&content)
        .map_err(|e| SessionError::Transport(format!("writing {remote}: {e}")))?;
    Ok(())
}

impl Ssh2Session {
    async fn exec(
        &self,
        display: &str,
        wrapped: String,
        stdin: Option<String>,
    ) -> Result<CommandOutput> {
        trace!(command = %wrapped, "exec");
        let session = self.session.clone();
        tokio::task::spawn_blocking(move || exec_blocking(&session, &wrapped, stdin.as_deref()))
            .await
            .with_context(|| format!("spawn_blocking for '{display}'"))?
    }
}

impl RemoteSession for Ssh2Session {
    async fn run(&self, command: &str, opts: RunOptions) -> Result<CommandOutput> {
        let out = self
            .exec(command, self.ctx.shell_command(command), None)
            .await?;
        debug!(user = %self.ctx.user, command, code = out.exit_code, "run");
        out.check(command, opts)
    }

    async fn escalate(&self, command: &str, opts: RunOptions) -> Result<CommandOutput> {
        let stdin = self.ctx.escalation.as_ref().map(|s| s.expose().to_string());
        let out = self
            .exec(command, self.ctx.sudo_command(command), stdin)
            .await?;
        debug!(user = %self.ctx.user, command, code = out.exit_code, "escalate");
        out.check(command, opts)
    }

    async fn upload(&self, local: &Path, remote: &str) -> Result<()> {
        debug!(local = %local.display(), remote, "upload");
        let session = self.session.clone();
        let local = local.to_path_buf();
        let target = remote.to_string();
        tokio::task::spawn_blocking(move || upload_blocking(&session, &local, &target))
            .await
            .with_context(|| format!("spawn_blocking for upload to {remote}"))?
    }

    async fn close(self) -> Result<()> {
        let Self { session, ctx } = self;
        tokio::task::spawn_blocking(move || {
            session
                .disconnect(None, "provisioning stage finished", None)
                .map_err(transport)
        })
        .await
        .context("spawn_blocking for ssh disconnect")??;
        debug!(host = %ctx.host, user = %ctx.user, "ssh session closed");
        Ok(())
    }
}
