//! Postern - passwordless email-OTP authentication service
//!
//! This library provides the core functionality for the Postern auth service.
//! It exposes all modules for testing purposes.

pub mod auth;
pub mod challenge;
pub mod entities;
pub mod errors;
pub mod mailer;
pub mod otp;
pub mod session;
pub mod settings;
pub mod storage;
pub mod token;
pub mod web;
