//! HTML for the panel and login pages.

use crate::reconcile::Snapshot;

pub struct PanelView<'a> {
    pub title: &'a str,
    pub temperature: &'a str,
    pub snapshot: &'a Snapshot,
    pub show_logout: bool,
}

pub fn render_panel(view: &PanelView<'_>) -> String {
    let mut rows = String::new();
    for pin in &view.snapshot.pins {
        let stale = view.snapshot.stale.iter().any(|(id, _)| *id == pin.id);
        let (state, class) = if pin.level { ("on", "on") } else { ("off", "off") };
        rows.push_str(&format!(
            r#"      <tr class="{class}">
        <td>{name}</td>
        <td class="state">{state}{stale}</td>
        <td><a class="btn" href="/{id}/on">On</a> <a class="btn" href="/{id}/off">Off</a></td>
      </tr>
"#,
            class = class,
            name = escape(&pin.display_name),
            state = state,
            stale = if stale { r#" <span class="stale" title="read failed">?</span>"# } else { "" },
            id = pin.id,
        ));
    }

    let logout = if view.show_logout {
        r#"<a href="/logout">Log out</a>"#
    } else {
        ""
    };

    // Rows go in last; escaped text carries no braces to re-expand.
    PANEL_HTML
        .replace("{{title}}", &escape(view.title))
        .replace("{{temperature}}", &escape(view.temperature))
        .replace("{{logout}}", logout)
        .replace("{{rows}}", &rows)
}

pub fn render_login(title: &str, failed: bool) -> String {
    let error = if failed {
        r#"<p class="error">Invalid username or password</p>"#
    } else {
        ""
    };
    LOGIN_HTML
        .replace("{{title}}", &escape(title))
        .replace("{{error}}", error)
}

/// Minimal HTML escaping for text and attribute content.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '{' => out.push_str("&#123;"),
            '}' => out.push_str("&#125;"),
            _ => out.push(c),
        }
    }
    out
}

const PANEL_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>{{title}}</title>
  <style>
    :root { --bg: #1a1a2e; --card: #16213e; --accent: #e94560; --on: #4ecca3; --text: #eee; --muted: #888; }
    * { box-sizing: border-box; margin: 0; padding: 0; }
    body { font-family: system-ui, -apple-system, sans-serif; background: var(--bg); color: var(--text); padding: 1rem; }
    .header { display: flex; justify-content: space-between; align-items: center; margin-bottom: 1rem; flex-wrap: wrap; gap: 0.5rem; }
    h1 { font-size: 1.5rem; }
    .temp { color: var(--muted); }
    table { width: 100%; border-collapse: collapse; background: var(--card); border-radius: 8px; }
    td { padding: 0.75rem; border-bottom: 1px solid #0f3460; }
    tr.on .state { color: var(--on); font-weight: bold; }
    tr.off .state { color: var(--muted); }
    .stale { color: var(--accent); }
    .btn { background: #0f3460; color: var(--text); padding: 0.4rem 0.8rem; border-radius: 4px; text-decoration: none; }
    .system { margin-top: 1rem; display: flex; gap: 0.5rem; }
    .system button { background: var(--accent); border: none; color: white; padding: 0.5rem 1rem; border-radius: 4px; cursor: pointer; }
    a { color: var(--text); }
  </style>
</head>
<body>
  <div class="header">
    <h1>{{title}}</h1>
    <span class="temp">CPU {{temperature}}</span>
    <span><a href="/VNC">Remote desktop</a> {{logout}}</span>
  </div>
  <table>
    <tbody>
{{rows}}    </tbody>
  </table>
  <div class="system">
    <form method="post" action="/restart"><button type="submit">Restart</button></form>
    <form method="post" action="/shutdown"><button type="submit">Shut down</button></form>
  </div>
</body>
</html>
"##;

const LOGIN_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>{{title}} - Login</title>
  <style>
    body { font-family: system-ui, -apple-system, sans-serif; background: #1a1a2e; color: #eee; display: flex; justify-content: center; padding-top: 4rem; }
    form { background: #16213e; padding: 2rem; border-radius: 8px; display: flex; flex-direction: column; gap: 0.75rem; min-width: 16rem; }
    input { padding: 0.5rem; border-radius: 4px; border: none; }
    button { background: #e94560; border: none; color: white; padding: 0.5rem; border-radius: 4px; cursor: pointer; }
    .error { color: #e94560; }
  </style>
</head>
<body>
  <form method="post" action="/login">
    <h1>{{title}}</h1>
    {{error}}
    <input name="username" placeholder="Username" autocomplete="username">
    <input name="password" type="password" placeholder="Password" autocomplete="current-password">
    <button type="submit">Log in</button>
  </form>
</body>
</html>
"##;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::HardwareError;
    use crate::registry::{Pin, PinId};

    fn pin(id: u32, name: &str, level: bool) -> Pin {
        Pin {
            id: PinId(id),
            display_name: name.to_string(),
            level,
        }
    }

    #[test]
    fn test_render_panel() {
        let snapshot = Snapshot {
            pins: vec![pin(7, "Porch", true), pin(11, "<Garage>", false)],
            stale: vec![(
                PinId(11),
                HardwareError::NotConfigured(PinId(11)),
            )],
        };
        let html = render_panel(&PanelView {
            title: "Control Panel",
            temperature: "47.2 °C",
            snapshot: &snapshot,
            show_logout: false,
        });

        assert!(html.contains("47.2 °C"));
        assert!(html.contains(r#"href="/7/on""#));
        assert!(html.contains(r#"href="/11/off""#));
        assert!(html.contains("&lt;Garage&gt;"));
        assert!(html.contains(r#"class="stale""#));
        assert!(!html.contains("/logout"));
    }

    #[test]
    fn test_placeholder_in_pin_name_stays_literal() {
        let snapshot = Snapshot {
            pins: vec![pin(1, "{{logout}}", false), pin(2, "{{temperature}}", false)],
            stale: vec![],
        };
        let html = render_panel(&PanelView {
            title: "{{rows}}",
            temperature: "40.0 °C",
            snapshot: &snapshot,
            show_logout: true,
        });

        assert_eq!(html.matches(r#"href="/logout""#).count(), 1);
        assert_eq!(html.matches("40.0 °C").count(), 1);
        assert!(html.contains("<td>&#123;&#123;logout&#125;&#125;</td>"));
        assert!(html.contains("<title>&#123;&#123;rows&#125;&#125;</title>"));
    }

    #[test]
    fn test_render_login_error() {
        assert!(render_login("Panel", true).contains("Invalid username"));
        assert!(!render_login("Panel", false).contains("Invalid username"));
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape(r#"a&b "c" <d>"#), "a&amp;b &quot;c&quot; &lt;d&gt;");
    }
}
