use vs_core::ReadOptions;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScopeMeta {
    pub special: bool,
    pub not_context: bool,
    pub view_model: bool,
    pub variable: bool,
}

impl ScopeMeta {
    pub fn special() -> Self {
        Self {
            special: true,
            ..Self::default()
        }
    }

    pub fn not_context() -> Self {
        Self {
            not_context: true,
            ..Self::default()
        }
    }

    pub fn view_model() -> Self {
        Self {
            view_model: true,
            ..Self::default()
        }
    }

    pub fn variable() -> Self {
        Self {
            variable: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScopeOptions {
    pub current_scope_only: bool,
    pub special: bool,
    pub read: ReadOptions,
}

impl Default for ScopeOptions {
    fn default() -> Self {
        Self {
            current_scope_only: true,
            special: false,
            read: ReadOptions::default(),
        }
    }
}

impl ScopeOptions {
    pub fn argument() -> Self {
        Self {
            read: ReadOptions::argument(),
            ..Self::default()
        }
    }

    pub fn whole_chain(mut self) -> Self {
        self.current_scope_only = false;
        self
    }

    pub fn special() -> Self {
        Self {
            special: true,
            ..Self::default()
        }
    }

    pub fn with_args(mut self, args: Vec<vs_core::Value>) -> Self {
        self.read.args = args;
        self
    }
}
