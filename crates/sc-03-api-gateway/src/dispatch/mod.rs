//! Job dispatch and live result delivery.

pub mod channels;
pub mod dispatcher;

pub use channels::{ConnectionId, DeliveryMiss, LiveChannelRegistry, ResultMessage, ResultReceiver};
pub use dispatcher::{
    result_message, DispatchError, DispatchStats, DispatchStatsSnapshot, Dispatcher, Job,
    PROCESSED_MESSAGE,
};
