//! Service Layer
//!
//! Business logic for collections, users and sign-in, plus the clients for
//! the external collaborators (mail, image CDN, book catalog, Google OAuth).

pub mod book_catalog;
pub mod collection;
pub mod email_service;
pub mod identity;
pub mod image_cdn;
pub mod jwt;
pub mod oauth_service;
pub mod user;

// Re-export services
pub use book_catalog::{BookCatalog, GoogleBooksCatalog};
pub use collection::CollectionService;
pub use email_service::{EmailService, LogMailer, MailTransport, SmtpMailer};
pub use identity::IdentityService;
pub use image_cdn::{CloudinaryCdn, ImageCdn, UnconfiguredCdn};
pub use jwt::JwtService;
pub use oauth_service::OAuthService;
pub use user::UserService;
