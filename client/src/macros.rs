//! Macro functions used in the `Client::dispatch` handlers.

/// Just to move some code from the overwhelmed dispatch handlers.
macro_rules! log_send(
    ($message:expr, $destination:expr) => (
        info!("Sending {} to {}", $message, $destination);
    );
);

/// Just to move some code from the overwhelmed dispatch handlers.
macro_rules! log_receive(
    ($message:expr) => (
        info!("Received {}", $message);
    );
);

/// Silently ignores a message without a usable message type option.
macro_rules! validate(
    ($message:expr) => (
        match $message.options.message_type() {
            Some(message_type) => message_type,
            None => {
                warn!("Ignoring a message without a valid message type option");
                return Ok(());
            }
        }
    );
);

/// Silently ignores a response to somebody else's transaction.
macro_rules! check_xid(
    ($yours:expr, $response:expr) => (
        if $response != $yours {
            warn!(
                "Got a response with wrong transaction ID: {:08x} (yours is {:08x})",
                $response, $yours
            );
            return Ok(());
        }
    );
);
