//! # userkit
//!
//! Converge Elasticsearch security users to a declared state, whatever the
//! generation of the cluster's client.
//!
//! This crate provides:
//! - Translation of declared users to put-user bodies and of get-user
//!   responses back to snapshots ([`wire`])
//! - One adapter per client generation behind the [`UserApi`] trait, with
//!   [`ClientHandle`] dispatching between them ([`family`])
//! - "Not found" classification by the adapter that raised the error
//! - Create/read/update/delete with convergent not-found handling
//!   ([`Reconciler`])
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use userkit::transport::http::HttpTransport;
//! use userkit::{ChangeSet, ClientHandle, DeclaredUser, Reconciler, UserState};
//!
//! let transport = Arc::new(HttpTransport::new("http://localhost:9200"));
//! let client = ClientHandle::connect(transport, None)?;
//! let reconciler = Reconciler::new(&client);
//!
//! let desired = DeclaredUser::new("alice")
//!     .with_roles(["admin"])
//!     .with_password("secret1");
//!
//! let mut state = UserState::Absent;
//! reconciler.create(&mut state, &desired)?;
//!
//! // Later: change roles without rotating the password.
//! let desired = desired.with_roles(["admin", "monitor"]);
//! let changes = ChangeSet::diff(state.observed().unwrap(), &desired);
//! reconciler.update(&mut state, &desired, &changes)?;
//!
//! reconciler.delete(&mut state)?;
//! # Ok::<(), userkit::Error>(())
//! ```
//!
//! ## Client Generations
//!
//! | Generation | Users API                | put/get/delete |
//! |------------|--------------------------|----------------|
//! | 7.x        | `/_security/user`        | yes            |
//! | 6.x        | `/_xpack/security/user`  | yes            |
//! | 5.x        | none                     | unsupported    |

pub mod error;
pub mod family;
pub mod model;
pub mod reconcile;
pub mod transport;
pub mod wire;

pub use error::{Error, ErrorCategory, Operation, Result, TransportError};
pub use family::{ApiFamily, ClientHandle, UserApi};
pub use model::{ChangeSet, DeclaredUser, Field, RemoteUser};
pub use reconcile::{Reconciler, UserState};
