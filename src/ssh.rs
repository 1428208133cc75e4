//! Scoped ssh-agent bootstrap for pushes to the mirror remote.

use std::io::Write;
use std::process::Command;

use base64::prelude::*;
use log::warn;
use regex::Regex;

use crate::error::{BridgeError, Result};

/// A running ssh-agent seeded with the mirror deploy key.
///
/// The agent is killed exactly once when the handle drops, on success and
/// error paths alike. The socket is injected into individual git commands
/// instead of being exported process-wide.
pub struct SshAgent {
    pid: String,
    auth_sock: String,
}

impl SshAgent {
    /// Start an agent and add the base64-encoded private key to it.
    pub fn start(key_base64: &str) -> Result<Self> {
        println!("Starting ssh-agent");
        let output = Command::new("ssh-agent").arg("-s").output()?;
        if !output.status.success() {
            return Err(BridgeError::Ssh("ssh-agent -s failed".to_string()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let (pid, auth_sock) = parse_agent_output(&stdout)
            .ok_or_else(|| BridgeError::Ssh("could not detect ssh-agent PID and socket".to_string()))?;
        let agent = Self { pid, auth_sock };

        let key = decode_private_key(key_base64)?;
        let mut key_file = tempfile::NamedTempFile::new()?;
        key_file.write_all(&key)?;
        key_file.flush()?;

        let added = Command::new("ssh-add")
            .arg(key_file.path())
            .env("SSH_AUTH_SOCK", &agent.auth_sock)
            .output()?;
        if !added.status.success() {
            // The agent handle drops here and shuts the agent down.
            return Err(BridgeError::Ssh(format!(
                "ssh-add failed: {}",
                String::from_utf8_lossy(&added.stderr).trim()
            )));
        }

        Ok(agent)
    }

    /// Socket path git commands must use to reach this agent.
    pub fn auth_sock(&self) -> &str {
        &self.auth_sock
    }
}

impl Drop for SshAgent {
    fn drop(&mut self) {
        println!("    Shutting down ssh-agent({})", self.pid);
        let result = Command::new("ssh-agent")
            .arg("-k")
            .env("SSH_AGENT_PID", &self.pid)
            .output();
        match result {
            Ok(output) if !output.status.success() => {
                warn!(
                    "ssh-agent -k exited nonzero: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                );
            }
            Ok(_) => {}
            Err(e) => warn!("failed to shut down ssh-agent {}: {e}", self.pid),
        }
    }
}

/// Pull the PID and auth socket out of `ssh-agent -s` output.
fn parse_agent_output(stdout: &str) -> Option<(String, String)> {
    let pid_re = Regex::new(r"SSH_AGENT_PID=([0-9]+)").unwrap();
    let sock_re = Regex::new(r"SSH_AUTH_SOCK=([^;]+);").unwrap();

    let pid = pid_re.captures(stdout)?.get(1)?.as_str().to_string();
    let sock = sock_re.captures(stdout)?.get(1)?.as_str().to_string();
    Some((pid, sock))
}

/// Decode the deploy key, stripping any carriage returns picked up while
/// the secret was provisioned.
fn decode_private_key(key_base64: &str) -> Result<Vec<u8>> {
    let mut key = BASE64_STANDARD
        .decode(key_base64.trim())
        .map_err(|e| BridgeError::Ssh(format!("invalid base64 ssh key: {e}")))?;
    key.retain(|&byte| byte != b'\r');
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    const AGENT_OUTPUT: &str = "SSH_AUTH_SOCK=/tmp/ssh-XXXX/agent.123; export SSH_AUTH_SOCK;\nSSH_AGENT_PID=124; export SSH_AGENT_PID;\necho Agent pid 124;\n";

    #[test]
    fn parse_agent_output_finds_pid_and_socket() {
        let (pid, sock) = parse_agent_output(AGENT_OUTPUT).unwrap();
        assert_eq!(pid, "124");
        assert_eq!(sock, "/tmp/ssh-XXXX/agent.123");
    }

    #[test]
    fn parse_agent_output_rejects_incomplete_output() {
        assert!(parse_agent_output("echo Agent pid 124;").is_none());
    }

    #[test]
    fn decode_private_key_strips_carriage_returns() {
        let encoded = BASE64_STANDARD.encode("line one\r\nline two\r\n");
        let decoded = decode_private_key(&encoded).unwrap();
        assert_eq!(decoded, b"line one\nline two\n");
    }

    #[test]
    fn decode_private_key_rejects_bad_base64() {
        assert!(decode_private_key("not!!!base64").is_err());
    }
}
