use crate::{AdminSettings, ClientCommon, TcpProxy};
use std::fmt::Write;

/// The section holding the agent-wide settings. No proxy may use this name.
const COMMON_SECTION: &str = "common";

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("{field} must not contain line breaks")]
    LineBreak { field: &'static str },

    #[error("invalid proxy name {0:?}")]
    InvalidName(String),

    #[error("proxy name {0:?} is reserved")]
    ReservedName(String),

    #[error("duplicate proxy {0:?}")]
    DuplicateProxy(String),

    #[error(transparent)]
    Format(#[from] std::fmt::Error),
}

/// Renders an frpc INI config.
///
/// Proxies are emitted in name order so that the same inputs always yield
/// the same bytes, regardless of the order in which they were listed.
pub fn render(
    common: &ClientCommon,
    admin: &AdminSettings,
    proxies: &[TcpProxy],
) -> Result<String, RenderError> {
    let mut proxies = proxies.iter().collect::<Vec<_>>();
    proxies.sort_by(|a, b| a.name.cmp(&b.name));
    for pair in proxies.windows(2) {
        if pair[0].name == pair[1].name {
            return Err(RenderError::DuplicateProxy(pair[0].name.clone()));
        }
    }

    let mut out = String::new();
    writeln!(out, "[{COMMON_SECTION}]")?;
    entry(&mut out, "server_addr", &common.server_addr)?;
    entry(&mut out, "server_port", &common.server_port)?;
    entry(&mut out, "token", &common.token)?;
    entry(&mut out, "admin_addr", &admin.addr)?;
    entry(&mut out, "admin_port", &admin.port)?;
    entry(&mut out, "admin_user", &admin.username)?;
    entry(&mut out, "admin_pwd", &admin.password)?;

    for proxy in proxies {
        section_name(&proxy.name)?;
        writeln!(out)?;
        writeln!(out, "[{}]", proxy.name)?;
        entry(&mut out, "type", &"tcp")?;
        entry(&mut out, "local_ip", &proxy.local_addr)?;
        entry(&mut out, "local_port", &proxy.local_port)?;
        entry(&mut out, "remote_port", &proxy.remote_port)?;
    }

    Ok(out)
}

fn entry(
    out: &mut String,
    field: &'static str,
    value: &dyn std::fmt::Display,
) -> Result<(), RenderError> {
    let value = value.to_string();
    if value.contains(['\r', '\n']) {
        return Err(RenderError::LineBreak { field });
    }
    writeln!(out, "{field} = {value}")?;
    Ok(())
}

fn section_name(name: &str) -> Result<(), RenderError> {
    if name == COMMON_SECTION {
        return Err(RenderError::ReservedName(name.to_string()));
    }
    let valid = !name.is_empty()
        && !name
            .chars()
            .any(|c| c == '[' || c == ']' || c.is_whitespace() || c.is_control());
    if !valid {
        return Err(RenderError::InvalidName(name.to_string()));
    }
    Ok(())
}
