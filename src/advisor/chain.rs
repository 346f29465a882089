//! Ordered set of advisors.

use std::sync::Arc;

use tracing::warn;

use super::{ChatRequest, ConversationAdvisor};

/// A start hook failed part way through the chain.
#[derive(Debug)]
pub struct StartFailure {
    /// State produced by the advisors that started successfully.
    pub request: ChatRequest,
    pub error: crate::Error,
}

impl From<StartFailure> for crate::Error {
    fn from(failure: StartFailure) -> Self {
        failure.error
    }
}

/// Advisors sorted by [`ConversationAdvisor::order`], ties kept in registration order.
#[derive(Clone, Default)]
pub struct AdvisorChain {
    advisors: Vec<Arc<dyn ConversationAdvisor>>,
}

impl AdvisorChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<A: ConversationAdvisor + 'static>(&mut self, advisor: A) {
        self.register_arc(Arc::new(advisor));
    }

    pub fn register_arc(&mut self, advisor: Arc<dyn ConversationAdvisor>) {
        self.advisors.push(advisor);
        self.advisors.sort_by_key(|a| a.order());
    }

    pub fn names(&self) -> Vec<&str> {
        self.advisors.iter().map(|a| a.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.advisors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.advisors.is_empty()
    }

    /// Run every start hook in order. On failure the request built by the
    /// advisors that already started is handed back, so their end hooks see
    /// any conversation id they minted.
    pub fn start(&self, request: ChatRequest) -> Result<ChatRequest, StartFailure> {
        let mut request = request;
        for advisor in &self.advisors {
            match advisor.on_conversation_start(request.clone()) {
                Ok(next) => request = next,
                Err(error) => {
                    warn!(advisor = advisor.name(), error = %error, "Conversation start hook failed");
                    return Err(StartFailure { request, error });
                }
            }
        }
        Ok(request)
    }

    pub fn before_call(&self, mut request: ChatRequest) -> crate::Result<ChatRequest> {
        for advisor in &self.advisors {
            request = advisor.before_model_call(request)?;
        }
        Ok(request)
    }

    /// Run every end hook in reverse order. All hooks run even if one fails;
    /// the first error is returned.
    pub fn end(&self, request: &ChatRequest) -> crate::Result<()> {
        let mut first_error = None;
        for advisor in self.advisors.iter().rev() {
            if let Err(e) = advisor.on_conversation_end(request) {
                warn!(advisor = advisor.name(), error = %e, "Conversation end hook failed");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl std::fmt::Debug for AdvisorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdvisorChain")
            .field("advisors", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct Recording {
        name: &'static str,
        order: i32,
        log: Arc<Mutex<Vec<String>>>,
        fail_start: bool,
        fail_end: bool,
    }

    impl ConversationAdvisor for Recording {
        fn name(&self) -> &str {
            self.name
        }

        fn order(&self) -> i32 {
            self.order
        }

        fn on_conversation_start(&self, request: ChatRequest) -> crate::Result<ChatRequest> {
            if self.fail_start {
                return Err(crate::Error::Session("refused".into()));
            }
            Ok(request.with_conversation_id(format!("{}-id", self.name)))
        }

        fn before_model_call(&self, mut request: ChatRequest) -> crate::Result<ChatRequest> {
            request.system.push_str(self.name);
            Ok(request)
        }

        fn on_conversation_end(&self, _request: &ChatRequest) -> crate::Result<()> {
            self.log.lock().unwrap().push(self.name.to_string());
            if self.fail_end {
                return Err(crate::Error::Session("boom".into()));
            }
            Ok(())
        }
    }

    #[test]
    fn test_order_and_reverse_end() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = AdvisorChain::new();
        for (name, order, fail_end) in [("b", 20, true), ("a", 10, false), ("c", 30, false)] {
            chain.register(Recording {
                name,
                order,
                log: Arc::clone(&log),
                fail_start: false,
                fail_end,
            });
        }
        assert_eq!(chain.names(), vec!["a", "b", "c"]);

        let request = chain.before_call(ChatRequest::new(">")).unwrap();
        assert_eq!(request.system, ">abc");

        assert!(chain.end(&request).is_err());
        assert_eq!(*log.lock().unwrap(), vec!["c", "b", "a"]);
    }

    #[test]
    fn test_failed_start_returns_partial_request() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = AdvisorChain::new();
        for (name, order, fail_start) in [("first", 1, false), ("second", 2, true)] {
            chain.register(Recording {
                name,
                order,
                log: Arc::clone(&log),
                fail_start,
                fail_end: false,
            });
        }

        let failure = chain.start(ChatRequest::new("")).unwrap_err();
        assert_eq!(failure.request.conversation_id.as_deref(), Some("first-id"));
        assert!(matches!(failure.error, crate::Error::Session(_)));
    }
}
