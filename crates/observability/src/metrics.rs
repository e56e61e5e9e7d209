//! Output / routing metric helpers
//!
//! Thin wrappers over the `metrics` facade so metric names and labels live
//! in one place.

use metrics::{counter, gauge, histogram};

/// Record a frame handed to the ports of a channel
pub fn record_frame_distributed(channel: i32, ports: usize) {
    counter!(
        "playout_frames_distributed_total",
        "channel" => channel.to_string()
    )
    .increment(1);
    gauge!("playout_output_ports", "channel" => channel.to_string()).set(ports as f64);
}

/// Record the outcome of one send to a consumer
pub fn record_send_result(channel: i32, consumer: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "playout_consumer_sends_total",
        "channel" => channel.to_string(),
        "consumer" => consumer.to_string(),
        "status" => status
    )
    .increment(1);
}

/// Record a consumer retried after a failed send
pub fn record_send_retry(channel: i32, consumer: &str) {
    counter!(
        "playout_consumer_retries_total",
        "channel" => channel.to_string(),
        "consumer" => consumer.to_string()
    )
    .increment(1);
}

/// Record a consumer removed from a channel because it failed
pub fn record_port_evicted(channel: i32, port: i32, reason: &'static str) {
    counter!(
        "playout_ports_evicted_total",
        "channel" => channel.to_string(),
        "port" => port.to_string(),
        "reason" => reason
    )
    .increment(1);
}

/// Record the frame ring capacity (pipeline latency in frames)
pub fn record_ring_capacity(channel: i32, capacity: usize) {
    gauge!("playout_output_ring_capacity", "channel" => channel.to_string()).set(capacity as f64);
}

/// Record how long the synchronous distribution phase took
pub fn record_consume_latency_ms(channel: i32, latency_ms: f64) {
    histogram!("playout_consume_latency_ms", "channel" => channel.to_string()).record(latency_ms);
}

/// Record the number of subscribers of a route
pub fn record_route_subscribers(route: &str, subscribers: usize) {
    gauge!("playout_route_subscribers", "route" => route.to_string()).set(subscribers as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_without_recorder_is_noop() {
        record_frame_distributed(1, 2);
        record_send_result(1, "log", true);
        record_send_retry(1, "log");
        record_port_evicted(1, 3, "send");
        record_ring_capacity(1, 3);
        record_consume_latency_ms(1, 0.5);
        record_route_subscribers("1/10", 1);
    }
}
