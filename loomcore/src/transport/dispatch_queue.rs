//! Fair-share dispatch queue in front of the worker port. Bounds how many
//! requests can be in flight at once and rotates which tab/job gets served next
//! so one noisy tab can't starve the others (§4.5.2).

use std::collections::VecDeque;

use super::worker_port::ExecuteRequest;

pub const MAX_QUEUED_REQUESTS: usize = 120;

#[derive(Debug, Clone, Copy)]
pub struct DispatchLimits {
    pub max_concurrent_requests: usize,
}

impl Default for DispatchLimits {
    fn default() -> Self {
        Self { max_concurrent_requests: 2 }
    }
}

/// What the caller should do after asking the queue for the next request.
#[derive(Debug)]
pub enum DispatchDecision {
    Send(ExecuteRequest),
    Empty,
    Backpressure { wait_ms: i64 },
}

/// A bounded FIFO with round-robin fairness across `tab_id`, biased toward the
/// currently active tab and away from whichever job was dispatched last.
pub struct DispatchQueue {
    queue: VecDeque<ExecuteRequest>,
    limits: DispatchLimits,
    in_flight: usize,
    active_tab_id: Option<String>,
    last_dispatched_job_id: Option<String>,
    last_dispatched_tab_id: Option<String>,
    dispatch_cursor: usize,
}

impl DispatchQueue {
    #[must_use]
    pub fn new(limits: DispatchLimits) -> Self {
        Self {
            queue: VecDeque::new(),
            limits,
            in_flight: 0,
            active_tab_id: None,
            last_dispatched_job_id: None,
            last_dispatched_tab_id: None,
            dispatch_cursor: 0,
        }
    }

    pub fn set_active_tab(&mut self, tab_id: impl Into<String>) {
        self.active_tab_id = Some(tab_id.into());
    }

    /// Enqueues a request. Returns `Err(request)` unchanged if the queue is full,
    /// handing the caller's request back so it can surface backpressure upstream.
    pub fn enqueue(&mut self, request: ExecuteRequest) -> Result<(), ExecuteRequest> {
        if self.queue.len() >= MAX_QUEUED_REQUESTS {
            return Err(request);
        }
        self.queue.push_back(request);
        Ok(())
    }

    fn wait_ms(&self) -> i64 {
        let queue_len = self.queue.len().max(1);
        let batches = (queue_len as f64 / self.limits.max_concurrent_requests.max(1) as f64).ceil() as i64;
        (batches * 250).max(500)
    }

    /// Picks the next request to dispatch, if concurrency allows.
    ///
    /// Priority: a request from the active tab first, then the request that is
    /// neither from the same tab nor same job as the last dispatch (round-robin
    /// fairness), then whatever has waited longest.
    pub fn next(&mut self) -> DispatchDecision {
        if self.queue.is_empty() {
            return DispatchDecision::Empty;
        }
        if self.in_flight >= self.limits.max_concurrent_requests {
            return DispatchDecision::Backpressure { wait_ms: self.wait_ms() };
        }

        let active_tab_index = self
            .active_tab_id
            .as_ref()
            .and_then(|tab| self.queue.iter().position(|r| &r.tab_id == tab));

        let fairness_index = self.queue.iter().position(|r| {
            Some(&r.job_id) != self.last_dispatched_job_id.as_ref()
                && Some(&r.tab_id) != self.last_dispatched_tab_id.as_ref()
        });

        let chosen_index = active_tab_index.or(fairness_index).unwrap_or(0);
        let request = self.queue.remove(chosen_index).expect("index bounded by queue.len()");

        self.in_flight += 1;
        self.last_dispatched_job_id = Some(request.job_id.clone());
        self.last_dispatched_tab_id = Some(request.tab_id.clone());
        self.dispatch_cursor = self.dispatch_cursor.wrapping_add(1);

        DispatchDecision::Send(request)
    }

    /// Call once a dispatched request's outcome (success, failure, or cancellation)
    /// is known, freeing a concurrency slot.
    pub fn complete(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(key: &str, job: &str, tab: &str) -> ExecuteRequest {
        ExecuteRequest::new(key, job, tab, "translate", serde_json::Value::Null)
    }

    #[test]
    fn active_tab_is_preferred_over_fifo_order() {
        let mut queue = DispatchQueue::new(DispatchLimits { max_concurrent_requests: 2 });
        queue.enqueue(request("r1", "j1", "tab-a")).unwrap();
        queue.enqueue(request("r2", "j2", "tab-b")).unwrap();
        queue.set_active_tab("tab-b");

        match queue.next() {
            DispatchDecision::Send(req) => assert_eq!(req.request_key, "r2"),
            other => panic!("expected Send, got {other:?}"),
        }
    }

    #[test]
    fn concurrency_limit_triggers_backpressure() {
        let mut queue = DispatchQueue::new(DispatchLimits { max_concurrent_requests: 1 });
        queue.enqueue(request("r1", "j1", "tab-a")).unwrap();
        queue.enqueue(request("r2", "j2", "tab-b")).unwrap();

        assert!(matches!(queue.next(), DispatchDecision::Send(_)));
        match queue.next() {
            DispatchDecision::Backpressure { wait_ms } => assert!(wait_ms >= 500),
            other => panic!("expected Backpressure, got {other:?}"),
        }

        queue.complete();
        assert!(matches!(queue.next(), DispatchDecision::Send(_)));
    }

    #[test]
    fn fairness_avoids_repeating_the_same_job_back_to_back() {
        let mut queue = DispatchQueue::new(DispatchLimits { max_concurrent_requests: 2 });
        queue.enqueue(request("r1", "j1", "tab-a")).unwrap();
        queue.enqueue(request("r2", "j1", "tab-a")).unwrap();
        queue.enqueue(request("r3", "j2", "tab-b")).unwrap();

        let first = match queue.next() {
            DispatchDecision::Send(req) => req.request_key,
            other => panic!("expected Send, got {other:?}"),
        };
        assert_eq!(first, "r1");

        let second = match queue.next() {
            DispatchDecision::Send(req) => req.request_key,
            other => panic!("expected Send, got {other:?}"),
        };
        assert_eq!(second, "r3");
    }

    #[test]
    fn queue_rejects_enqueue_once_full() {
        let mut queue = DispatchQueue::new(DispatchLimits::default());
        for i in 0..MAX_QUEUED_REQUESTS {
            queue.enqueue(request(&format!("r{i}"), "j1", "tab-a")).unwrap();
        }
        assert!(queue.enqueue(request("overflow", "j1", "tab-a")).is_err());
    }
}
