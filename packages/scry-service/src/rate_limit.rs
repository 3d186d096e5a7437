//! Fixed-window request counters keyed by session, client IP and a global key.

use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::{Error, Result};

const GLOBAL_KEY: &str = "global";

#[derive(Clone, Copy, Debug)]
struct Window {
	count: u32,
	reset_at: Instant,
}

pub struct RateLimiter {
	enabled: bool,
	window: Duration,
	session_limit: u32,
	ip_limit: u32,
	global_limit: u32,
	max_tracked_keys: usize,
	windows: DashMap<String, Window>,
}
impl RateLimiter {
	pub fn from_config(cfg: &scry_config::RateLimit) -> Self {
		Self {
			enabled: cfg.enabled,
			window: Duration::from_millis(u64::try_from(cfg.window_ms).unwrap_or(0)),
			session_limit: cfg.session_limit,
			ip_limit: cfg.ip_limit,
			global_limit: cfg.global_limit,
			max_tracked_keys: cfg.max_tracked_keys,
			windows: DashMap::new(),
		}
	}

	pub fn check(&self, session_id: Option<&str>, client_ip: &str) -> Result<()> {
		self.check_at(session_id, client_ip, Instant::now())
	}

	/// Global counter first, so a saturated service never creates per-client windows, then
	/// session, then IP. The first exhausted counter denies.
	pub fn check_at(&self, session_id: Option<&str>, client_ip: &str, now: Instant) -> Result<()> {
		if !self.enabled {
			return Ok(());
		}

		self.hit(GLOBAL_KEY.to_string(), self.global_limit, now)?;

		if let Some(session_id) = session_id.map(str::trim).filter(|id| !id.is_empty()) {
			self.hit(format!("session:{session_id}"), self.session_limit, now)?;
		}

		self.hit(format!("ip:{client_ip}"), self.ip_limit, now)
	}

	/// Per-client windows currently held. Never exceeds `max_tracked_keys`.
	pub fn tracked_keys(&self) -> usize {
		self.windows.len() - usize::from(self.windows.contains_key(GLOBAL_KEY))
	}

	/// Drops every window that has already reset.
	pub fn sweep(&self, now: Instant) {
		self.windows.retain(|_, window| now <= window.reset_at);
	}

	/// Frees a client slot: expired windows go first, then the window resetting soonest.
	fn make_room(&self, now: Instant) {
		if self.tracked_keys() < self.max_tracked_keys {
			return;
		}

		self.sweep(now);

		while self.tracked_keys() >= self.max_tracked_keys {
			let Some(oldest) = self
				.windows
				.iter()
				.filter(|entry| entry.key() != GLOBAL_KEY)
				.min_by_key(|entry| entry.value().reset_at)
				.map(|entry| entry.key().clone())
			else {
				return;
			};

			tracing::debug!(key = %oldest, "Evicted a rate limit window to stay under the cap.");

			self.windows.remove(&oldest);
		}
	}

	fn hit(&self, key: String, limit: u32, now: Instant) -> Result<()> {
		if key != GLOBAL_KEY && !self.windows.contains_key(&key) {
			self.make_room(now);
		}

		let mut window = self
			.windows
			.entry(key)
			.or_insert(Window { count: 0, reset_at: now + self.window });

		if now > window.reset_at {
			*window = Window { count: 1, reset_at: now + self.window };

			return Ok(());
		}
		if window.count >= limit {
			let remaining = window.reset_at.saturating_duration_since(now);
			let retry_after_secs = remaining.as_millis().div_ceil(1_000).max(1);

			return Err(Error::RateLimited {
				retry_after_secs: u64::try_from(retry_after_secs).unwrap_or(u64::MAX),
			});
		}

		window.count += 1;

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn limiter(session_limit: u32, ip_limit: u32, global_limit: u32) -> RateLimiter {
		RateLimiter::from_config(&scry_config::RateLimit {
			enabled: true,
			window_ms: 60_000,
			session_limit,
			ip_limit,
			global_limit,
			max_tracked_keys: 4,
		})
	}

	fn retry_after(result: Result<()>) -> Option<u64> {
		match result {
			Err(Error::RateLimited { retry_after_secs }) => Some(retry_after_secs),
			_ => None,
		}
	}

	#[test]
	fn denies_the_request_after_the_limit() {
		let limiter = limiter(3, 10, 100);
		let now = Instant::now();

		for _ in 0..3 {
			assert!(limiter.check_at(Some("s1"), "10.0.0.1", now).is_ok());
		}

		let denied = retry_after(limiter.check_at(Some("s1"), "10.0.0.1", now));

		assert_eq!(denied, Some(60));
	}

	#[test]
	fn window_expiry_allows_the_key_again() {
		let limiter = limiter(1, 10, 100);
		let now = Instant::now();

		assert!(limiter.check_at(Some("s1"), "10.0.0.1", now).is_ok());
		assert!(limiter.check_at(Some("s1"), "10.0.0.1", now).is_err());

		let later = now + Duration::from_millis(60_001);

		assert!(limiter.check_at(Some("s1"), "10.0.0.1", later).is_ok());
	}

	#[test]
	fn distinct_keys_do_not_interfere() {
		let limiter = limiter(1, 10, 100);
		let now = Instant::now();

		assert!(limiter.check_at(Some("s1"), "10.0.0.1", now).is_ok());
		assert!(limiter.check_at(Some("s2"), "10.0.0.2", now).is_ok());
		assert!(limiter.check_at(Some("s1"), "10.0.0.1", now).is_err());
	}

	#[test]
	fn ip_limit_applies_without_a_session() {
		let limiter = limiter(1, 2, 100);
		let now = Instant::now();

		assert!(limiter.check_at(None, "10.0.0.1", now).is_ok());
		assert!(limiter.check_at(None, "10.0.0.1", now).is_ok());
		assert!(limiter.check_at(None, "10.0.0.1", now).is_err());
	}

	#[test]
	fn retry_after_rounds_up() {
		let limiter = limiter(1, 10, 100);
		let now = Instant::now();

		assert!(limiter.check_at(Some("s1"), "10.0.0.1", now).is_ok());

		let later = now + Duration::from_millis(58_500);

		assert_eq!(retry_after(limiter.check_at(Some("s1"), "10.0.0.1", later)), Some(2));
	}

	#[test]
	fn expired_windows_are_swept_when_the_cap_is_reached() {
		let limiter = limiter(5, 10, 1_000);
		let now = Instant::now();

		for ip in 0..4 {
			assert!(limiter.check_at(None, &format!("10.0.0.{ip}"), now).is_ok());
		}

		assert_eq!(limiter.tracked_keys(), 4);

		let later = now + Duration::from_millis(60_001);

		assert!(limiter.check_at(None, "10.0.1.1", later).is_ok());
		assert_eq!(limiter.tracked_keys(), 1);
	}

	#[test]
	fn the_window_resetting_soonest_is_evicted_at_the_cap() {
		let limiter = limiter(5, 10, 1_000);
		let now = Instant::now();

		for ip in 0..4 {
			let at = now + Duration::from_millis(ip * 10);

			assert!(limiter.check_at(None, &format!("10.0.0.{ip}"), at).is_ok());
		}

		assert!(limiter.check_at(None, "10.0.1.1", now + Duration::from_millis(50)).is_ok());
		assert_eq!(limiter.tracked_keys(), 4);
		assert!(!limiter.windows.contains_key("ip:10.0.0.0"));
		assert!(limiter.windows.contains_key("ip:10.0.1.1"));
	}

	#[test]
	fn rotating_identities_cannot_grow_the_map() {
		let limiter = RateLimiter::from_config(&scry_config::RateLimit {
			enabled: true,
			window_ms: 60_000,
			session_limit: 5,
			ip_limit: 10,
			global_limit: 100,
			max_tracked_keys: 50,
		});
		let now = Instant::now();
		let mut allowed = 0;

		for idx in 0..10_000 {
			let session = format!("session-{idx}");
			let ip = format!("10.{}.{}.{}", idx / 65_536, (idx / 256) % 256, idx % 256);

			if limiter.check_at(Some(&session), &ip, now).is_ok() {
				allowed += 1;
			}

			assert!(limiter.tracked_keys() <= 50);
		}

		assert_eq!(allowed, 100);
		assert!(limiter.tracked_keys() <= 50);
	}

	#[test]
	fn disabled_limiter_allows_everything() {
		let limiter = RateLimiter::from_config(&scry_config::RateLimit {
			enabled: false,
			..scry_config::RateLimit::default()
		});

		for _ in 0..100 {
			assert!(limiter.check(Some("s1"), "10.0.0.1").is_ok());
		}
	}
}
