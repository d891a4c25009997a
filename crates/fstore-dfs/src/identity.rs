//! Effective user identities and scoped impersonation.
//!
//! `UserIdentity::do_as` installs an identity as the calling thread's
//! current identity for the duration of a closure. The previous identity is
//! restored by a drop guard, so it is restored on every exit path, panics
//! included. Filesystem handles read the current identity exactly once, when
//! they are acquired.

use std::cell::RefCell;
use std::fmt;

use crate::error::{DfsError, DfsResult};

thread_local! {
    static CURRENT: RefCell<Vec<UserIdentity>> = const { RefCell::new(Vec::new()) };
}

const FALLBACK_LOGIN: &str = "nobody";

/// A user principal, optionally acting on behalf of a real (proxy) user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserIdentity {
    user_name: String,
    groups: Vec<String>,
    real_user: Option<Box<UserIdentity>>,
}

impl UserIdentity {
    /// Creates an identity for `user_name`.
    pub fn new(user_name: &str) -> DfsResult<Self> {
        validate_principal(user_name)?;
        Ok(Self {
            user_name: user_name.to_string(),
            groups: Vec::new(),
            real_user: None,
        })
    }

    /// Creates an identity for `user_name` impersonated by `real_user`.
    pub fn create_proxy_user(user_name: &str, real_user: &UserIdentity) -> DfsResult<Self> {
        let mut proxy = Self::new(user_name)?;
        proxy.real_user = Some(Box::new(real_user.clone()));
        Ok(proxy)
    }

    /// Returns a copy carrying the given group memberships.
    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups = groups.into_iter().map(Into::into).collect();
        self
    }

    /// The identity the process runs as, from `USER`.
    pub fn login_user() -> Self {
        let name = std::env::var("USER")
            .ok()
            .filter(|n| validate_principal(n).is_ok())
            .unwrap_or_else(|| FALLBACK_LOGIN.to_string());
        Self {
            user_name: name,
            groups: Vec::new(),
            real_user: None,
        }
    }

    /// The innermost `do_as` identity of this thread, else the login user.
    pub fn current() -> Self {
        CURRENT
            .with(|stack| stack.borrow().last().cloned())
            .unwrap_or_else(Self::login_user)
    }

    /// Full principal name.
    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    /// Principal name without Kerberos instance or realm.
    pub fn short_user_name(&self) -> &str {
        let end = self
            .user_name
            .find(['/', '@'])
            .unwrap_or(self.user_name.len());
        &self.user_name[..end]
    }

    /// Group memberships known for this identity.
    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    /// The impersonating user, for proxy identities.
    pub fn real_user(&self) -> Option<&UserIdentity> {
        self.real_user.as_deref()
    }

    /// Returns true if this identity is impersonated by another.
    pub fn is_proxy(&self) -> bool {
        self.real_user.is_some()
    }

    /// Runs `action` with this identity installed as the thread's current identity.
    pub fn do_as<T, F>(&self, action: F) -> T
    where
        F: FnOnce() -> T,
    {
        let _guard = IdentityGuard::install(self.clone());
        action()
    }
}

impl fmt::Display for UserIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.real_user {
            Some(real) => write!(f, "{} (via {})", self.user_name, real.user_name),
            None => f.write_str(&self.user_name),
        }
    }
}

struct IdentityGuard;

impl IdentityGuard {
    fn install(identity: UserIdentity) -> Self {
        CURRENT.with(|stack| stack.borrow_mut().push(identity));
        IdentityGuard
    }
}

impl Drop for IdentityGuard {
    fn drop(&mut self) {
        CURRENT.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// Validates a user or group name.
pub fn validate_principal(name: &str) -> DfsResult<()> {
    if name.is_empty() {
        return Err(DfsError::InvalidArgument("principal name is empty".to_string()));
    }
    if name.chars().any(|c| c.is_whitespace() || c == ':' || c == ',') {
        return Err(DfsError::InvalidArgument(format!(
            "principal name '{}' contains whitespace, ':' or ','",
            name
        )));
    }
    Ok(())
}
