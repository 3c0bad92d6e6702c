//! Route tables.
//!
//! ```text
//! GET  /health                                  service + store health
//!
//! GET  /proxy?url=&context=&reviewerName=&reviewerEmail=     interactive
//! GET  /proxy-dashboard?url=&context=           replay only
//! GET  /proxy-preview?url=                      rewrite only
//!
//! POST /save-feedback                           store one annotation
//! GET  /feedback?target=&context=               list annotations
//! ```

pub mod feedback;
pub mod health;
pub mod proxy;
