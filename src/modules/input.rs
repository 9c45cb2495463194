//! Keyboard and mouse events forwarded by the host.

use crate::client::CompanionClient;

/// Input event listeners.
#[derive(Debug, Clone, Copy)]
pub struct Input<'a> {
    client: &'a CompanionClient,
}

impl<'a> Input<'a> {
    pub(crate) fn new(client: &'a CompanionClient) -> Self {
        Self { client }
    }

    listener_methods! {
        on_key_press => "keypress";
        on_key_release => "keyrelease";
        on_mouse_press => "mousepress";
        on_mouse_release => "mouserelease";
        on_mouse_move => "mousemove";
        on_mouse_scroll => "mousescroll";
    }
}
