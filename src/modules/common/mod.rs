use mail_parser::{Addr as MimeAddr, Address as MimeAddress};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::ops::Deref;

pub mod lru;
pub mod paginated;
pub mod parallel;
pub mod signal;
pub mod timeout;
pub mod validator;

/// A display-name + email-address pair, as it appears in From/To/Cc headers.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Addr {
    pub name: Option<String>,
    pub address: Option<String>,
}

impl Addr {
    pub fn parse(s: &str) -> Self {
        let re = Regex::new(r#"(?:(?P<name>.*)\s*)?<(?P<email>[^<>]+)>"#).unwrap();
        if let Some(caps) = re.captures(s) {
            let name: Option<String> = caps.name("name").map(|m| m.as_str().trim().into());
            let email: Option<String> = caps.name("email").map(|m| m.as_str().trim().into());
            Addr {
                name: name.filter(|n| !n.is_empty()),
                address: email,
            }
        } else {
            let s_trimmed = s.trim();
            Addr {
                name: None,
                address: if s_trimmed.is_empty() { None } else { Some(s_trimmed.into()) },
            }
        }
    }
}

impl std::fmt::Display for Addr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.name, &self.address) {
            (Some(name), Some(address)) => write!(f, "{} <{}>", name, address),
            (None, Some(address)) => write!(f, "<{}>", address),
            (Some(name), None) => write!(f, "{}", name),
            (None, None) => write!(f, ""),
        }
    }
}

impl<'x> From<&MimeAddr<'x>> for Addr {
    fn from(original: &MimeAddr<'x>) -> Self {
        Addr {
            name: original.name.as_ref().map(|s| s.to_string()),
            address: original.address.as_ref().map(|s| s.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AddrVec(pub Vec<Addr>);

impl Deref for AddrVec {
    type Target = Vec<Addr>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'x> From<&MimeAddress<'x>> for AddrVec {
    fn from(original: &MimeAddress<'x>) -> Self {
        let vec = match original {
            MimeAddress::List(addrs) => addrs.iter().map(Addr::from).collect(),
            MimeAddress::Group(groups) => groups
                .iter()
                .flat_map(|group| group.addresses.iter().map(Addr::from))
                .collect(),
        };
        AddrVec(vec)
    }
}
