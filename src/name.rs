//! Environment-scoped resource name allocation
//!
//! Every resource name is `{environment}-{base}`, optionally followed by a
//! short random disambiguation token for resources that must be globally
//! unique and are replaced (not updated) on redeploy. Undisambiguated names
//! are deterministic - the same inputs always produce the same name - which
//! is what keeps re-provisioning idempotent. Requesting `unique: true`
//! intentionally gives up that idempotence: the resource will be recreated
//! under a fresh name on every deployment.
//!
//! Entropy comes through the [`TokenSource`] trait so tests can script the
//! tokens.

use rand::Rng;
use tracing::debug;

use crate::{Error, Result};

/// Alphabet used for disambiguation tokens
pub const TOKEN_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz";

/// Length of a disambiguation token
pub const TOKEN_LEN: usize = 4;

/// Source of random disambiguation tokens
///
/// Production uses [`ThreadRngTokens`]; tests supply a scripted source so
/// allocated names are reproducible.
pub trait TokenSource {
    /// Produce a token of `len` characters drawn from [`TOKEN_ALPHABET`]
    fn token(&mut self, len: usize) -> String;
}

/// Token source backed by the thread-local RNG
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadRngTokens;

impl TokenSource for ThreadRngTokens {
    fn token(&mut self, len: usize) -> String {
        let mut rng = rand::thread_rng();
        (0..len)
            .map(|_| TOKEN_ALPHABET[rng.gen_range(0..TOKEN_ALPHABET.len())] as char)
            .collect()
    }
}

/// Naming grammar for a target resource type
///
/// The allocator composes the name; the grammar (supplied by the caller,
/// since only the caller knows the target resource type) decides whether the
/// composed name is legal for the backend.
#[derive(Clone, Copy, Debug)]
pub struct NameGrammar {
    max_len: usize,
    allowed: fn(char) -> bool,
    description: &'static str,
}

impl NameGrammar {
    /// Build a grammar from a length bound and a per-character predicate
    pub const fn new(max_len: usize, allowed: fn(char) -> bool, description: &'static str) -> Self {
        Self {
            max_len,
            allowed,
            description,
        }
    }

    /// Grammar for object-store containers: `[a-z0-9-]`, at most 63 chars
    pub fn object_store() -> Self {
        Self::new(
            63,
            |c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-',
            "[a-z0-9-]",
        )
    }

    /// Grammar for catalog databases and crawlers: `[a-z0-9_-]`, at most 255 chars
    pub fn catalog() -> Self {
        Self::new(
            255,
            |c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_',
            "[a-z0-9_-]",
        )
    }

    /// Grammar for query workgroups: `[a-z0-9._-]`, at most 128 chars
    pub fn workgroup() -> Self {
        Self::new(
            128,
            |c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_' || c == '.',
            "[a-z0-9._-]",
        )
    }

    /// Grammar for roles, data sources and other `[a-z0-9-]` names up to 128 chars
    pub fn general() -> Self {
        Self::new(
            128,
            |c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-',
            "[a-z0-9-]",
        )
    }

    /// Validate a composed name against this grammar
    pub fn validate(&self, name: &str) -> Result<()> {
        if name.len() > self.max_len {
            return Err(Error::invalid_name(
                name,
                format!("exceeds {} characters", self.max_len),
            ));
        }
        if let Some(bad) = name.chars().find(|c| !(self.allowed)(*c)) {
            return Err(Error::invalid_name(
                name,
                format!("character '{bad}' is outside {}", self.description),
            ));
        }
        Ok(())
    }
}

/// The parts of an allocated name
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamePlan {
    /// Deployment environment the name is scoped to
    pub environment: String,
    /// Caller-chosen base name
    pub base: String,
    /// Random token, present only for `unique` allocations
    pub disambiguator: Option<String>,
}

impl NamePlan {
    /// Render the plan as the final resource name
    pub fn render(&self) -> String {
        match &self.disambiguator {
            Some(token) => format!("{}-{}-{}", self.environment, self.base, token),
            None => format!("{}-{}", self.environment, self.base),
        }
    }
}

/// Allocates environment-scoped resource names
#[derive(Clone, Debug, Default)]
pub struct NameAllocator<S = ThreadRngTokens> {
    tokens: S,
}

impl NameAllocator<ThreadRngTokens> {
    /// Allocator using the thread-local RNG for disambiguation tokens
    pub fn new() -> Self {
        Self::default()
    }
}

impl<S: TokenSource> NameAllocator<S> {
    /// Allocator with an injected token source
    pub fn with_source(tokens: S) -> Self {
        Self { tokens }
    }

    /// Compose and validate an environment-scoped name
    ///
    /// With `unique: false` this is a pure function of its inputs. With
    /// `unique: true` a fresh token is appended, so the result differs on
    /// every call - callers opt into this only for resources that must be
    /// replaced on redeploy.
    pub fn allocate(
        &mut self,
        environment: &str,
        base: &str,
        grammar: &NameGrammar,
        unique: bool,
    ) -> Result<String> {
        if environment.is_empty() {
            return Err(Error::invalid_name(base, "environment must not be empty"));
        }
        if base.is_empty() {
            return Err(Error::invalid_name("", "base name must not be empty"));
        }

        let plan = NamePlan {
            environment: environment.to_string(),
            base: base.to_string(),
            disambiguator: unique.then(|| self.tokens.token(TOKEN_LEN)),
        };
        let name = plan.render();
        if let Some(token) = &plan.disambiguator {
            debug!(name = %name, token = %token, "allocated disambiguated name");
        }
        grammar.validate(&name)?;
        Ok(name)
    }
}
