use rand::Rng;
use rand::seq::SliceRandom;

/// Timezone the booking site expects its visitors in.
pub const SITE_TIMEZONE: &str = "Europe/Stockholm";

const USER_AGENTS: [&str; 4] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
];

const VIEWPORTS: [(u32, u32); 5] = [
    (1920, 1080),
    (1366, 768),
    (1536, 864),
    (1440, 900),
    (1680, 1050),
];

/// Browser identity presented by one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    pub user_agent: String,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub timezone: String,
}

impl Fingerprint {
    /// Pick a common desktop identity at random.
    pub fn randomized() -> Self {
        Self::randomized_with(&mut rand::thread_rng())
    }

    pub fn randomized_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let user_agent = USER_AGENTS.choose(rng).unwrap_or(&USER_AGENTS[0]);
        let (width, height) = *VIEWPORTS.choose(rng).unwrap_or(&VIEWPORTS[0]);

        Self {
            user_agent: (*user_agent).to_string(),
            viewport_width: width,
            viewport_height: height,
            timezone: SITE_TIMEZONE.to_string(),
        }
    }
}

/// Scripts run in every document before the page's own code, hiding the
/// most common automation tells.
pub const STEALTH_SCRIPT: &str = r#"
Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en', 'sv'] });
"#;
