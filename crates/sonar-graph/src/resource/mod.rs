//! Typed resource declarations.
//!
//! Every declaration describes desired state only. A declaration lists the
//! resources it reads from as [`Reference`]s; the graph turns those into
//! dependency edges and refuses references to anything not yet declared.

pub mod compute;
pub mod database;
pub mod identity;
pub mod network;
pub mod secret;
pub mod security;
pub mod service;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sonar_common::types::{LogicalId, ResourceKind};

pub use self::compute::{ComputeCluster, UserData};
pub use self::database::DatabaseCluster;
pub use self::identity::{ExecutionIdentity, Grant};
pub use self::network::Network;
pub use self::secret::Credential;
pub use self::security::{IngressRule, SecurityPolicy};
pub use self::service::{ContainerLimits, SecretSource, Service, Ulimit, UlimitName};

/// Nature of a dependency edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EdgeKind {
    /// The dependent is configured with the dependency or one of its outputs.
    Reference,
    /// The dependent is authorized to act on the dependency.
    Grant,
    /// The dependent amends the dependency after it was fully declared.
    Attachment,
}

impl std::fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reference => write!(f, "reference"),
            Self::Grant => write!(f, "grant"),
            Self::Attachment => write!(f, "attachment"),
        }
    }
}

/// A dependency of a declaration on another declared resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Reference {
    /// Resource depended upon.
    pub target: LogicalId,
    /// Nature of the dependency.
    pub edge: EdgeKind,
}

impl Reference {
    /// Creates a plain configuration reference.
    #[must_use]
    pub const fn to(target: LogicalId) -> Self {
        Self {
            target,
            edge: EdgeKind::Reference,
        }
    }

    /// Creates a reference of the given kind.
    #[must_use]
    pub const fn with_edge(target: LogicalId, edge: EdgeKind) -> Self {
        Self { target, edge }
    }
}

/// Behavior shared by every declaration type.
pub trait Resource: std::fmt::Debug + Clone {
    /// Kind of resource this type declares.
    const KIND: ResourceKind;

    /// Resources this declaration reads from.
    fn references(&self) -> Vec<Reference>;

    /// Template properties of this declaration.
    fn properties(&self) -> Value;
}

/// Conversion between a concrete declaration type and [`Declaration`].
pub trait Declared: Resource + Into<Declaration> {
    /// Borrows the concrete declaration, if `declaration` is of this type.
    fn downcast(declaration: &Declaration) -> Option<&Self>;
}

macro_rules! declarations {
    ($($variant:ident($ty:ty)),+ $(,)?) => {
        /// A declared resource of any kind.
        #[derive(Debug, Clone)]
        pub enum Declaration {
            $(
                #[doc = concat!("A `", stringify!($variant), "` declaration.")]
                $variant($ty),
            )+
        }

        impl Declaration {
            /// Kind of the declared resource.
            #[must_use]
            pub const fn kind(&self) -> ResourceKind {
                match self {
                    $(Self::$variant(_) => <$ty as Resource>::KIND,)+
                }
            }

            /// Resources this declaration reads from.
            #[must_use]
            pub fn references(&self) -> Vec<Reference> {
                match self {
                    $(Self::$variant(r) => r.references(),)+
                }
            }

            /// Template properties of this declaration.
            #[must_use]
            pub fn properties(&self) -> Value {
                match self {
                    $(Self::$variant(r) => r.properties(),)+
                }
            }
        }

        $(
            impl From<$ty> for Declaration {
                fn from(resource: $ty) -> Self {
                    Self::$variant(resource)
                }
            }

            impl Declared for $ty {
                fn downcast(declaration: &Declaration) -> Option<&Self> {
                    match declaration {
                        Declaration::$variant(r) => Some(r),
                        _ => None,
                    }
                }
            }
        )+
    };
}

declarations! {
    Network(Network),
    Credential(Credential),
    SecurityPolicy(SecurityPolicy),
    DatabaseCluster(DatabaseCluster),
    ComputeCluster(ComputeCluster),
    ExecutionIdentity(ExecutionIdentity),
    Service(Service),
    ContainerLimits(ContainerLimits),
}
