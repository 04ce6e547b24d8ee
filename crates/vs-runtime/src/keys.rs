use std::sync::OnceLock;

use regex::Regex;

pub const THIS_KEY: &str = "this";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyInfo {
    pub is_scope: bool,
    pub is_in_scope: bool,
    pub is_current_context: bool,
    pub is_in_current_context: bool,
    pub is_parent_context: bool,
    pub is_in_parent_context: bool,
    pub parent_hops: usize,
    pub remaining_key: String,
    pub is_legacy_var: bool,
}

fn parent_hops_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"^((?:\.\./)*)").expect("parent hop regex must compile"))
}

impl KeyInfo {
    pub fn classify(key: &str) -> Self {
        if key == "scope" {
            return Self {
                is_scope: true,
                remaining_key: THIS_KEY.to_string(),
                ..Self::default()
            };
        }
        if let Some(rest) = key.strip_prefix("scope.") {
            return Self {
                is_in_scope: true,
                remaining_key: rest.to_string(),
                ..Self::default()
            };
        }
        if key.starts_with("scope@") {
            return Self {
                is_in_scope: true,
                remaining_key: key["scope".len()..].to_string(),
                ..Self::default()
            };
        }
        if let Some(rest) = key.strip_prefix('*') {
            return Self {
                is_in_scope: true,
                is_legacy_var: true,
                remaining_key: format!("vars.{}", rest),
                ..Self::default()
            };
        }

        let prefix_len = parent_hops_regex()
            .captures(key)
            .and_then(|captures| captures.get(1))
            .map(|prefix| prefix.end())
            .unwrap_or(0);
        let mut parent_hops = prefix_len / 3;
        let mut rest = &key[prefix_len..];
        if rest == ".." {
            parent_hops += 1;
            rest = "";
        }

        let mut info = Self {
            parent_hops,
            ..Self::default()
        };
        if parent_hops > 0 {
            let remaining = normalize(rest);
            info.is_parent_context = remaining == THIS_KEY;
            info.is_in_parent_context = !info.is_parent_context;
            info.remaining_key = remaining;
            return info;
        }

        if rest == "." || rest == THIS_KEY || rest == "./" {
            info.is_current_context = true;
            info.remaining_key = THIS_KEY.to_string();
        } else if let Some(stripped) = rest.strip_prefix("./") {
            info.is_in_current_context = true;
            info.remaining_key = normalize(stripped);
        } else if let Some(stripped) = rest.strip_prefix("this.") {
            info.is_in_current_context = true;
            info.remaining_key = normalize(stripped);
        } else if rest.starts_with("this@") {
            info.is_in_current_context = true;
            info.remaining_key = rest[THIS_KEY.len()..].to_string();
        } else {
            info.remaining_key = rest.to_string();
        }
        info
    }

    pub fn is_context_based(&self) -> bool {
        self.is_current_context
            || self.is_in_current_context
            || self.is_parent_context
            || self.is_in_parent_context
    }

    pub fn is_plain(&self) -> bool {
        !self.is_context_based() && !self.is_scope && !self.is_in_scope
    }
}

fn normalize(rest: &str) -> String {
    if rest.is_empty() || rest == "." {
        THIS_KEY.to_string()
    } else {
        rest.to_string()
    }
}
