//! Command context and authorization ports
//!
//! The host hands every command a `Context` carrying the block timestamp and
//! the verified signer addresses; signature verification itself happens
//! outside the engine. An `Authenticator` answers whether a given address
//! authorized the command.

use types::errors::{Error, ErrorKind, Result};
use types::prelude::Address;
use types::time::UnixTime;

/// Per-command execution context supplied by the host.
#[derive(Debug, Clone, Default)]
pub struct Context {
    block_time: Option<UnixTime>,
    signers: Vec<Address>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_block_time(mut self, time: UnixTime) -> Self {
        self.block_time = Some(time);
        self
    }

    pub fn with_signer(mut self, signer: Address) -> Self {
        self.signers.push(signer);
        self
    }

    /// The block timestamp. Fails when the header carries none.
    pub fn block_time(&self) -> Result<UnixTime> {
        self.block_time
            .ok_or_else(|| Error::new(ErrorKind::State, "no block time in header"))
    }

    /// Verified signers, first one is the main signer.
    pub fn signers(&self) -> &[Address] {
        &self.signers
    }
}

/// Answers address-authorization questions for a command.
pub trait Authenticator {
    /// Did `addr` authorize this command?
    fn has_address(&self, ctx: &Context, addr: &Address) -> bool;

    /// The command's primary signer, if any.
    fn main_signer(&self, ctx: &Context) -> Option<Address>;
}

/// Authenticator backed by the context's verified signer list.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignerAuth;

impl Authenticator for SignerAuth {
    fn has_address(&self, ctx: &Context, addr: &Address) -> bool {
        ctx.signers().contains(addr)
    }

    fn main_signer(&self, ctx: &Context) -> Option<Address> {
        ctx.signers().first().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::address::Condition;

    fn addr(tag: u8) -> Address {
        Condition::new("test", "signer", vec![tag]).address()
    }

    #[test]
    fn test_block_time_required() {
        let ctx = Context::new();
        assert!(ctx.block_time().unwrap_err().is(ErrorKind::State));

        let ctx = ctx.with_block_time(UnixTime::new(1234));
        assert_eq!(ctx.block_time().unwrap(), UnixTime::new(1234));
    }

    #[test]
    fn test_signer_auth() {
        let ctx = Context::new().with_signer(addr(1)).with_signer(addr(2));
        let auth = SignerAuth;

        assert!(auth.has_address(&ctx, &addr(1)));
        assert!(auth.has_address(&ctx, &addr(2)));
        assert!(!auth.has_address(&ctx, &addr(3)));
        assert_eq!(auth.main_signer(&ctx), Some(addr(1)));

        let empty = Context::new();
        assert_eq!(auth.main_signer(&empty), None);
    }
}
