//! IOS calls against a simulated Starlet.

mod ios;
mod sdio;
mod settings;
mod support;
