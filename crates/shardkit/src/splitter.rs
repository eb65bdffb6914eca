//! Named placement rules diverting matching modules into a shard

use crate::{matcher::Matcher, shard::looks_like_file_name, types::Module};

/// A configured rule deciding which modules go to the shard called `name`
#[derive(Debug, Clone)]
pub struct Splitter {
    pub name: String,
    /// Output path; `None` means no file is emitted for the shard
    pub dest: Option<String>,
    /// Matching modules are loaded on demand instead of eagerly
    pub dynamic: bool,
    matcher: Matcher,
}

impl Splitter {
    /// Create a static splitter. When `name` looks like a file name it doubles
    /// as the destination.
    pub fn new(name: impl Into<String>, matcher: Matcher) -> Self {
        let name = name.into();
        let dest = looks_like_file_name(&name).then(|| name.clone());
        Self {
            name,
            dest,
            dynamic: false,
            matcher,
        }
    }

    #[must_use]
    pub fn with_dest(mut self, dest: Option<String>) -> Self {
        self.dest = dest;
        self
    }

    #[must_use]
    pub fn with_dynamic(mut self, dynamic: bool) -> Self {
        self.dynamic = dynamic;
        self
    }

    pub fn is_match(&self, module: &Module) -> bool {
        self.matcher.is_match(module)
    }
}

/// First splitter matching `module`; order of `splitters` is significant
pub fn find_splitter<'a>(splitters: &'a [Splitter], module: &Module) -> Option<&'a Splitter> {
    splitters.iter().find(|splitter| splitter.is_match(module))
}
