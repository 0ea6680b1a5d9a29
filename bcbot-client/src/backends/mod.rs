// ABOUTME: Chat client implementations shipped with bcbot.
// ABOUTME: Real protocol clients are registered by embedding applications.

pub mod mock;
