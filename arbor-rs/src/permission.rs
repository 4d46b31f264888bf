//! Permission predicates and how named permissions are resolved.
//!
//! A [`Permission`] is a boolean expression over the sender. Leaves are either
//! closures over the sender or permission names; names are delegated to the
//! manager's [`PermissionChecker`], which is where a host plugs in its own
//! permission system.

use std::fmt;
use std::sync::Arc;

type Predicate<S> = Arc<dyn Fn(&S) -> bool + Send + Sync>;

/// Capability check attached to a command.
pub enum Permission<S> {
    /// Always granted.
    Empty,
    /// Resolved by the manager's [`PermissionChecker`].
    Named(String),
    /// Arbitrary test over the sender.
    Predicate(Predicate<S>),
    /// Granted when every member is granted.
    All(Vec<Permission<S>>),
    /// Granted when at least one member is granted.
    Any(Vec<Permission<S>>),
    Not(Box<Permission<S>>),
}

impl<S> Permission<S> {
    pub fn empty() -> Self {
        Permission::Empty
    }

    pub fn named(name: impl Into<String>) -> Self {
        Permission::Named(name.into())
    }

    pub fn predicate<F>(predicate: F) -> Self
    where
        F: Fn(&S) -> bool + Send + Sync + 'static,
    {
        Permission::Predicate(Arc::new(predicate))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Permission::Empty)
    }

    /// Both must be granted.
    pub fn and(self, other: Permission<S>) -> Self {
        match (self, other) {
            (Permission::Empty, other) | (other, Permission::Empty) => other,
            (Permission::All(mut left), Permission::All(right)) => {
                left.extend(right);
                Permission::All(left)
            }
            (Permission::All(mut left), other) => {
                left.push(other);
                Permission::All(left)
            }
            (left, right) => Permission::All(vec![left, right]),
        }
    }

    /// Either may be granted.
    pub fn or(self, other: Permission<S>) -> Self {
        match (self, other) {
            (Permission::Empty, _) | (_, Permission::Empty) => Permission::Empty,
            (Permission::Any(mut left), Permission::Any(right)) => {
                left.extend(right);
                Permission::Any(left)
            }
            (Permission::Any(mut left), other) => {
                left.push(other);
                Permission::Any(left)
            }
            (left, right) => Permission::Any(vec![left, right]),
        }
    }

    pub fn negate(self) -> Self {
        match self {
            Permission::Not(inner) => *inner,
            other => Permission::Not(Box::new(other)),
        }
    }

    /// Evaluate for `sender`, resolving names through `checker`.
    pub fn test(&self, sender: &S, checker: &dyn PermissionChecker<S>) -> bool {
        match self {
            Permission::Empty => true,
            Permission::Named(name) => checker.has_permission(sender, name),
            Permission::Predicate(predicate) => predicate(sender),
            Permission::All(members) => members.iter().all(|p| p.test(sender, checker)),
            Permission::Any(members) => members.iter().any(|p| p.test(sender, checker)),
            Permission::Not(inner) => !inner.test(sender, checker),
        }
    }
}

impl<S> Default for Permission<S> {
    fn default() -> Self {
        Permission::Empty
    }
}

impl<S> Clone for Permission<S> {
    fn clone(&self) -> Self {
        match self {
            Permission::Empty => Permission::Empty,
            Permission::Named(name) => Permission::Named(name.clone()),
            Permission::Predicate(predicate) => Permission::Predicate(Arc::clone(predicate)),
            Permission::All(members) => Permission::All(members.clone()),
            Permission::Any(members) => Permission::Any(members.clone()),
            Permission::Not(inner) => Permission::Not(inner.clone()),
        }
    }
}

impl<S> From<&str> for Permission<S> {
    fn from(name: &str) -> Self {
        Permission::named(name)
    }
}

impl<S> From<String> for Permission<S> {
    fn from(name: String) -> Self {
        Permission::Named(name)
    }
}

fn join<S>(f: &mut fmt::Formatter<'_>, members: &[Permission<S>], sep: &str) -> fmt::Result {
    f.write_str("(")?;
    for (i, member) in members.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{member}")?;
    }
    f.write_str(")")
}

impl<S> fmt::Display for Permission<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Permission::Empty => f.write_str("nothing"),
            Permission::Named(name) => f.write_str(name),
            Permission::Predicate(_) => f.write_str("<predicate>"),
            Permission::All(members) => join(f, members, " & "),
            Permission::Any(members) => join(f, members, " | "),
            Permission::Not(inner) => write!(f, "!{inner}"),
        }
    }
}

impl<S> fmt::Debug for Permission<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Permission({self})")
    }
}

// ============================================================================
// Checkers
// ============================================================================

/// Resolves [`Permission::Named`] leaves for a sender.
///
/// # Example
///
/// ```
/// use arbor::PermissionChecker;
///
/// struct Player {
///     grants: Vec<String>,
/// }
///
/// struct GrantList;
///
/// impl PermissionChecker<Player> for GrantList {
///     fn has_permission(&self, sender: &Player, permission: &str) -> bool {
///         sender.grants.iter().any(|g| g == permission)
///     }
/// }
/// ```
pub trait PermissionChecker<S>: Send + Sync {
    fn has_permission(&self, sender: &S, permission: &str) -> bool;
}

impl<S, F> PermissionChecker<S> for F
where
    F: Fn(&S, &str) -> bool + Send + Sync,
{
    fn has_permission(&self, sender: &S, permission: &str) -> bool {
        self(sender, permission)
    }
}

/// Grants every named permission.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl<S> PermissionChecker<S> for AllowAll {
    fn has_permission(&self, _sender: &S, _permission: &str) -> bool {
        true
    }
}

/// Denies every named permission. The manager's default.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAll;

impl<S> PermissionChecker<S> for DenyAll {
    fn has_permission(&self, _sender: &S, _permission: &str) -> bool {
        false
    }
}
