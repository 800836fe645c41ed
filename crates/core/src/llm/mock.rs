//! Scripted completion backend for tests and offline runs.
//!
//! Replies are routed by a needle searched for in the system prompt, which
//! makes it easy to script one answer per agent persona. Every request is
//! recorded so tests can assert on exactly what each agent was sent.

use async_trait::async_trait;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use super::{CompletionBackend, CompletionRequest};
use crate::error::PipelineError;

#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Upstream(String),
    /// Wait, then answer with the inner reply
    Delayed(Duration, Box<Reply>),
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Reply::Text(text.into())
    }

    pub fn json(value: serde_json::Value) -> Self {
        Reply::Text(value.to_string())
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Reply::Upstream(message.into())
    }

    pub fn after(delay: Duration, reply: Reply) -> Self {
        Reply::Delayed(delay, Box::new(reply))
    }
}

struct Rule {
    needle: String,
    /// Consumed front to back; the last reply repeats forever
    replies: VecDeque<Reply>,
}

#[derive(Default)]
pub struct ScriptedBackend {
    rules: Mutex<Vec<Rule>>,
    fallback: Option<Reply>,
    calls: Mutex<Vec<CompletionRequest>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply for requests whose system prompt contains `needle`.
    pub fn on(self, needle: impl Into<String>, reply: Reply) -> Self {
        let needle = needle.into();
        {
            let mut rules = lock(&self.rules);
            match rules.iter_mut().find(|r| r.needle == needle) {
                Some(rule) => rule.replies.push_back(reply),
                None => rules.push(Rule {
                    needle,
                    replies: VecDeque::from([reply]),
                }),
            }
        }
        self
    }

    /// Replace every reply queued for `needle` with `reply`.
    pub fn set(self, needle: impl Into<String>, reply: Reply) -> Self {
        let needle = needle.into();
        lock(&self.rules).retain(|r| r.needle != needle);
        self.on(needle, reply)
    }

    /// Hold every reply queued for `needle` back by `delay`.
    pub fn slow(self, needle: &str, delay: Duration) -> Self {
        if let Some(rule) = lock(&self.rules).iter_mut().find(|r| r.needle == needle) {
            for reply in rule.replies.iter_mut() {
                *reply = Reply::after(delay, reply.clone());
            }
        }
        self
    }

    /// Well-formed answers for every default persona: a photographer's
    /// portfolio site. Used by `sitesmith run --offline` and in tests.
    pub fn demo() -> Self {
        Self::new()
            .on(
                "Project Manager",
                Reply::json(json!({
                    "summary": "A portfolio site for a wedding and portrait photographer",
                    "target_users": "Couples and families looking to book a photographer",
                    "key_features": ["Photo gallery", "Booking enquiry form", "Client testimonials"],
                    "tech_stack": "Next.js 14, Tailwind CSS, Next.js API routes"
                })),
            )
            .on(
                "UI/UX Designer",
                Reply::json(json!({
                    "layout": "Full-width hero, masonry gallery, testimonials strip, enquiry form, footer",
                    "colors": ["#1a1a1a", "#f7f4ef", "#c8a97e"],
                    "typography": "Playfair Display for headings, Inter for body text",
                    "components": ["Header", "Hero", "Gallery", "Testimonials", "EnquiryForm", "Footer"]
                })),
            )
            .on(
                "Frontend Developer",
                Reply::text(format!(
                    "```json\n{}\n```",
                    json!({
                        "files": [
                            {
                                "path": "src/app/page.tsx",
                                "content": "import Hero from '@/components/Hero';\nimport Gallery from '@/components/Gallery';\n\nexport default function Home() {\n  return (<main><Hero /><Gallery /></main>);\n}\n",
                                "language": "typescript"
                            },
                            {
                                "path": "src/components/Gallery.tsx",
                                "content": "'use client';\nimport { useEffect, useState } from 'react';\n\nexport default function Gallery() {\n  const [photos, setPhotos] = useState<string[]>([]);\n  useEffect(() => { fetch('/api/photos').then(r => r.json()).then(setPhotos); }, []);\n  return (<section className=\"grid grid-cols-3 gap-2\">{photos.map(p => <img key={p} src={p} alt=\"\" />)}</section>);\n}\n",
                                "language": "typescript"
                            }
                        ]
                    })
                )),
            )
            .on(
                "Backend Developer",
                Reply::json(json!({
                    "files": [{
                        "path": "src/app/api/photos/route.ts",
                        "content": "const photos = ['/img/1.jpg', '/img/2.jpg', '/img/3.jpg'];\n\nexport async function GET() {\n  return Response.json(photos);\n}\n",
                        "language": "typescript"
                    }]
                })),
            )
            .on(
                "Content Writer",
                Reply::json(json!({
                    "hero_headline": "Moments worth keeping",
                    "hero_subheadline": "Natural, unposed wedding and portrait photography.",
                    "cta_text": "Check my dates",
                    "about_text": "I have photographed over 200 weddings across the coast.",
                    "features_content": [
                        { "title": "Gallery", "desc": "Browse recent weddings and portraits." },
                        { "title": "Booking", "desc": "Ask about your date in under a minute." }
                    ]
                })),
            )
            .on(
                "Code Reviewer",
                Reply::json(json!({
                    "score": 82,
                    "issues": [{
                        "severity": "medium",
                        "file": "src/components/Gallery.tsx",
                        "issue": "Images have empty alt text",
                        "suggestion": "Describe each photo in its alt attribute"
                    }]
                })),
            )
            .on(
                "QA Tester",
                Reply::json(json!({
                    "status": "PASS",
                    "bugs": [{
                        "severity": "low",
                        "issue": "Gallery shows nothing while photos load",
                        "suggestion": "Render a loading skeleton"
                    }]
                })),
            )
            .on(
                "Debugger",
                Reply::json(json!({
                    "fixed_files": [{
                        "path": "src/components/Gallery.tsx",
                        "content": "'use client';\nexport default function Gallery() { return null; }\n",
                        "language": "typescript"
                    }]
                })),
            )
    }

    /// Reply used when no needle matches.
    pub fn fallback(mut self, reply: Reply) -> Self {
        self.fallback = Some(reply);
        self
    }

    /// Every request received so far, in arrival order.
    pub fn calls(&self) -> Vec<CompletionRequest> {
        lock(&self.calls).clone()
    }

    /// Requests whose system prompt contains `needle`.
    pub fn calls_matching(&self, needle: &str) -> Vec<CompletionRequest> {
        lock(&self.calls)
            .iter()
            .filter(|c| c.system_prompt.contains(needle))
            .cloned()
            .collect()
    }

    fn next_reply(&self, system_prompt: &str) -> Option<Reply> {
        let mut rules = lock(&self.rules);
        let rule = rules
            .iter_mut()
            .find(|r| system_prompt.contains(r.needle.as_str()));
        match rule {
            Some(rule) if rule.replies.len() > 1 => rule.replies.pop_front(),
            Some(rule) => rule.replies.front().cloned(),
            None => self.fallback.clone(),
        }
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    async fn complete(&self, request: CompletionRequest) -> Result<String, PipelineError> {
        let reply = self.next_reply(&request.system_prompt);
        lock(&self.calls).push(request);

        let mut reply = reply.ok_or_else(|| {
            PipelineError::Upstream("No scripted reply for this request".to_string())
        })?;
        loop {
            match reply {
                Reply::Text(text) => return Ok(text),
                Reply::Upstream(message) => return Err(PipelineError::Upstream(message)),
                Reply::Delayed(delay, inner) => {
                    tokio::time::sleep(delay).await;
                    reply = *inner;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(system: &str) -> CompletionRequest {
        CompletionRequest {
            system_prompt: system.to_string(),
            user_prompt: "task".to_string(),
            temperature: 0.2,
            model: "mock".to_string(),
        }
    }

    #[tokio::test]
    async fn test_replies_are_consumed_then_repeat() {
        let backend = ScriptedBackend::new()
            .on("Planner", Reply::text("first"))
            .on("Planner", Reply::text("second"));

        assert_eq!(backend.complete(request("Planner")).await.unwrap(), "first");
        assert_eq!(backend.complete(request("Planner")).await.unwrap(), "second");
        assert_eq!(backend.complete(request("Planner")).await.unwrap(), "second");
        assert_eq!(backend.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_unmatched_without_fallback_is_upstream() {
        let backend = ScriptedBackend::new().on("Designer", Reply::text("{}"));
        let err = backend.complete(request("Writer")).await.unwrap_err();
        assert!(matches!(err, PipelineError::Upstream(_)));
        assert_eq!(backend.calls_matching("Writer").len(), 1);
    }

    #[tokio::test]
    async fn test_set_replaces_queue() {
        let backend = ScriptedBackend::new()
            .on("Planner", Reply::text("first"))
            .on("Planner", Reply::text("second"))
            .set("Planner", Reply::upstream("down"));

        assert!(backend.complete(request("Planner")).await.is_err());
        assert!(backend.complete(request("Planner")).await.is_err());
    }

    #[tokio::test]
    async fn test_delayed_reply() {
        let backend = ScriptedBackend::new().fallback(Reply::after(
            Duration::from_millis(5),
            Reply::upstream("timed out"),
        ));
        let err = backend.complete(request("any")).await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }
}
