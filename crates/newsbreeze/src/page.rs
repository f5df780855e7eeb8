use shared::{HeadlineEntry, ItemState, Services, SourceFeed, SummaryKind};

use crate::sessions::{FlashKind, UserSession};

pub struct PageRenderer;

impl PageRenderer {
    pub fn render(services: &Services, user: &UserSession) -> String {
        let session = &user.session;
        let mut html = String::new();

        html.push_str("<!DOCTYPE html>\n<html>\n<head>\n");
        html.push_str("  <meta charset=\"UTF-8\">\n");
        html.push_str("  <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
        html.push_str("  <title>NewsBreeze</title>\n");
        html.push_str("  <style>\n");
        html.push_str("    body { font-family: Arial, sans-serif; margin: 0; line-height: 1.6; color: #2c3e50; }\n");
        html.push_str("    .layout { display: flex; min-height: 100vh; }\n");
        html.push_str("    aside { width: 280px; padding: 20px; background-color: #f0f2f6; }\n");
        html.push_str("    main { flex: 1; max-width: 900px; padding: 20px 40px; }\n");
        html.push_str("    h1 { margin-bottom: 0; }\n");
        html.push_str("    h3.tagline { margin-top: 5px; color: #555; font-weight: normal; }\n");
        html.push_str("    label { display: block; margin-top: 15px; font-weight: bold; }\n");
        html.push_str("    select, button { width: 100%; padding: 6px; margin-top: 5px; }\n");
        html.push_str("    .flash { padding: 10px 15px; border-radius: 4px; margin: 15px 0; }\n");
        html.push_str("    .success { background-color: #dff0d8; }\n");
        html.push_str("    .info { background-color: #d9edf7; }\n");
        html.push_str("    .error { background-color: #f8d7da; }\n");
        html.push_str("    .warning { background-color: #fff3cd; padding: 10px; border-radius: 4px; }\n");
        html.push_str("    details.headline { margin: 10px 0; padding: 10px; border: 1px solid #ddd; border-radius: 4px; }\n");
        html.push_str("    details.headline > summary { cursor: pointer; font-weight: bold; }\n");
        html.push_str("    .columns { display: flex; gap: 20px; }\n");
        html.push_str("    .columns .text { flex: 3; }\n");
        html.push_str("    .columns .controls { flex: 1; }\n");
        html.push_str("    .metadata { color: #7f8c8d; font-size: 0.9em; }\n");
        html.push_str("    audio { width: 100%; margin-top: 10px; }\n");
        html.push_str("    footer { margin-top: 40px; border-top: 1px solid #ddd; color: #888; }\n");
        html.push_str("  </style>\n");
        html.push_str("</head>\n<body>\n<div class=\"layout\">\n");

        Self::render_sidebar(&mut html, services, user);

        html.push_str("<main>\n");
        html.push_str("<h1>NewsBreeze 📰🔊</h1>\n");
        html.push_str("<h3 class=\"tagline\">Your Celebrity-Powered Audio News Reader</h3>\n");

        if let Some(flash) = &user.flash {
            let class = match flash.kind {
                FlashKind::Success => "success",
                FlashKind::Info => "info",
                FlashKind::Error => "error",
            };
            html.push_str(&format!(
                "<div class=\"flash {}\">{}</div>\n",
                class,
                escape_html(&flash.text)
            ));
        }

        match session.current_feed() {
            Some(feed) if !feed.entries.is_empty() => {
                Self::render_feed(&mut html, feed, session.selected_voice(), user.focus)
            }
            Some(feed) => {
                if let Some(error) = &feed.error {
                    html.push_str(&format!(
                        "<div class=\"flash error\">Failed to fetch news: {}</div>\n",
                        escape_html(error)
                    ));
                }
                html.push_str("<div class=\"flash info\">Click on 'Fetch Latest News' to get started.</div>\n");
            }
            None => {
                html.push_str("<div class=\"flash info\">Click on 'Fetch Latest News' to get started.</div>\n");
            }
        }

        html.push_str("<footer><p>NewsBreeze | Powered by Hugging Face and Coqui XTTS-v2</p></footer>\n");
        html.push_str("</main>\n</div>\n</body>\n</html>");
        html
    }

    fn render_sidebar(html: &mut String, services: &Services, user: &UserSession) {
        let session = &user.session;

        html.push_str("<aside>\n<h2>Settings</h2>\n");
        html.push_str("<form method=\"post\" action=\"/select\">\n");

        html.push_str("  <label for=\"source\">Select News Source</label>\n");
        html.push_str("  <select id=\"source\" name=\"source\">\n");
        for source in services.catalog.sources() {
            let selected = if source.slug == session.selected_source() { " selected" } else { "" };
            html.push_str(&format!(
                "    <option value=\"{}\"{}>{}</option>\n",
                escape_html(&source.slug),
                selected,
                escape_html(&source.name)
            ));
        }
        html.push_str("  </select>\n");

        html.push_str("  <label for=\"voice\">Select Celebrity Voice</label>\n");
        html.push_str("  <select id=\"voice\" name=\"voice\">\n");
        for voice in services.voices.profiles() {
            let selected = if voice.name == session.selected_voice() { " selected" } else { "" };
            let missing = if voice.is_available() { "" } else { " (no sample)" };
            html.push_str(&format!(
                "    <option value=\"{}\"{}>{}{}</option>\n",
                escape_html(&voice.name),
                selected,
                escape_html(&voice.name),
                missing
            ));
        }
        html.push_str("  </select>\n");
        html.push_str("  <button type=\"submit\">Apply</button>\n");
        html.push_str("</form>\n");

        html.push_str("<form method=\"post\" action=\"/fetch\">\n");
        html.push_str("  <button type=\"submit\">Fetch Latest News</button>\n");
        html.push_str("</form>\n");

        if !services.voices.has_samples() {
            html.push_str(&format!(
                "<p class=\"warning\">⚠️ No reference voice samples found in <code>{}</code>. \
                 Voice cloning is not available until you add <code>.wav</code> samples.</p>\n",
                escape_html(&services.voices.dir().display().to_string())
            ));
        }

        let loaded: Vec<String> = session
            .loaded_sources()
            .filter_map(|slug| services.catalog.find(slug))
            .map(|s| escape_html(&s.name))
            .collect();
        if !loaded.is_empty() {
            html.push_str(&format!(
                "<p class=\"metadata\">Loaded this session: {}</p>\n",
                loaded.join(", ")
            ));
        }

        html.push_str("</aside>\n");
    }

    fn render_feed(html: &mut String, feed: &SourceFeed, voice: &str, focus: Option<usize>) {
        if let Some(error) = &feed.error {
            html.push_str(&format!(
                "<div class=\"flash error\">Last refresh failed: {}. Showing earlier headlines.</div>\n",
                escape_html(error)
            ));
        }

        for (index, entry) in feed.entries.iter().enumerate() {
            Self::render_entry(html, index, entry, voice, focus == Some(index));
        }
    }

    fn render_entry(html: &mut String, index: usize, entry: &HeadlineEntry, voice: &str, focused: bool) {
        let headline = &entry.headline;
        let open = if focused || entry.state != ItemState::Listed { " open" } else { "" };

        html.push_str(&format!(
            "<details class=\"headline\" id=\"item-{}\"{}>\n",
            index, open
        ));
        html.push_str(&format!(
            "  <summary>{}. {}</summary>\n",
            index + 1,
            escape_html(&headline.title)
        ));
        html.push_str("  <div class=\"columns\">\n    <div class=\"text\">\n");
        html.push_str(&format!(
            "      <p class=\"metadata\">{} · {}</p>\n",
            escape_html(&headline.source),
            escape_html(&headline.published_label())
        ));
        html.push_str(&format!(
            "      <p><strong>Original:</strong> {}</p>\n",
            escape_html(entry.source_text())
        ));

        match &entry.summary {
            Some(summary) => {
                let label = match summary.kind {
                    SummaryKind::Condensed => "Summary",
                    SummaryKind::Passthrough => "Summary (already brief)",
                    SummaryKind::Degraded(_) => "Summary (unavailable, showing original)",
                };
                html.push_str(&format!(
                    "      <p><strong>{}:</strong> {}</p>\n",
                    label,
                    escape_html(&summary.text)
                ));
            }
            None => {
                html.push_str(&format!(
                    "      <form method=\"post\" action=\"/headlines/{}/expand\"><button type=\"submit\">Generate summary</button></form>\n",
                    index
                ));
            }
        }

        if let Some(notice) = &entry.notice {
            html.push_str(&format!(
                "      <p class=\"warning\">{}</p>\n",
                escape_html(notice)
            ));
        }

        html.push_str(&format!(
            "      <a href=\"{}\" target=\"_blank\" rel=\"noopener\">Read more</a>\n",
            escape_html(headline.link.as_str())
        ));
        html.push_str("    </div>\n    <div class=\"controls\">\n");
        html.push_str(&format!(
            "      <form method=\"post\" action=\"/headlines/{}/play\"><button type=\"submit\">🔊 Play with {}'s voice</button></form>\n",
            index,
            escape_html(voice)
        ));

        if let Some(clip) = &entry.clip {
            let autoplay = if focused { " autoplay" } else { "" };
            html.push_str(&format!(
                "      <audio controls{} src=\"/audio/{}?bytes={}\"></audio>\n",
                autoplay,
                index,
                clip.len_bytes()
            ));
            html.push_str(&format!(
                "      <p class=\"metadata\">{} · {:.1}s</p>\n",
                escape_html(&clip.voice),
                clip.duration.as_secs_f32()
            ));
        }

        html.push_str("    </div>\n  </div>\n</details>\n");
    }
}

pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
