//! Renderizado de la página principal.
//!
//! Todo el estilo y los textos llegan en un `UiConfig` explícito; no hay
//! estado global de presentación.

use std::path::PathBuf;

use serde::Serialize;

use crate::config::AppConfig;

/// Textos que el frontend muestra en cada estado de la petición.
#[derive(Debug, Clone, Serialize)]
pub struct UiMessages {
    pub prompt: String,
    pub button: String,
    pub empty_warning: String,
    pub working: String,
    pub result_heading: String,
    pub success: String,
    pub legend_heading: String,
}

impl Default for UiMessages {
    fn default() -> Self {
        Self {
            prompt: "Introduce la descripción del libro:".to_string(),
            button: "Predecir".to_string(),
            empty_warning: "Por favor, escribe primero la descripción del libro.".to_string(),
            working: "Realizando la predicción...".to_string(),
            result_heading: "Resultado de la predicción:".to_string(),
            success: "¡Predicción completada!".to_string(),
            legend_heading: "Géneros posibles".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UiConfig {
    pub title: String,
    pub background: String,
    pub widget_background: String,
    pub input_background: String,
    pub text_color: String,
    pub logo_path: PathBuf,
    pub messages: UiMessages,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            title: "BookGenie".to_string(),
            background: "#d3d3d3".to_string(),
            widget_background: "#eeeeee".to_string(),
            input_background: "#cccccc".to_string(),
            text_color: "#888888".to_string(),
            logo_path: PathBuf::from("BookGenie.png"),
            messages: UiMessages::default(),
        }
    }
}

impl UiConfig {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            logo_path: cfg.logo_path.clone(),
            ..Self::default()
        }
    }

    pub fn logo_available(&self) -> bool {
        self.logo_path.is_file()
    }
}

/// Genera el HTML completo de la página.
pub fn render_page(ui: &UiConfig) -> String {
    let title = escape_html(&ui.title);
    let logo = if ui.logo_available() {
        format!("<img src=\"/logo\" width=\"50\" alt=\"{title}\">")
    } else {
        String::new()
    };
    // `</` cerraría el <script> que contiene el JSON.
    let messages = serde_json::to_string(&ui.messages)
        .unwrap_or_else(|_| "{}".to_string())
        .replace("</", "<\\/");

    format!(
        r#"<!DOCTYPE html>
<html lang="es">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<style>
  body {{ background-color: {background}; margin: 0; padding: 0; font-family: sans-serif; }}
  main {{ max-width: 720px; margin: 0 auto; padding: 32px 16px; }}
  .widget {{ background-color: {widget}; border-radius: 10px; padding: 16px; }}
  textarea {{ width: 100%; min-height: 160px; box-sizing: border-box; background-color: {input};
             border: none; border-radius: 10px; padding: 8px 12px; color: black; }}
  .custom-font {{ color: {text}; }}
  .header {{ display: flex; align-items: center; gap: 15px; }}
  .header h1 {{ margin: 0; }}
  .message {{ border-radius: 6px; padding: 8px 12px; margin-top: 12px; }}
  .message.warning {{ background: #fff3cd; }}
  .message.info {{ background: #d1ecf1; }}
  .message.success {{ background: #d4edda; }}
  .message.error {{ background: #f8d7da; }}
  .legend {{ margin-top: 24px; font-size: 0.9em; }}
  .legend ul {{ list-style: none; padding: 0; display: flex; flex-wrap: wrap; gap: 8px; }}
  .legend li {{ background-color: {widget}; border-radius: 6px; padding: 2px 8px; }}
  [hidden] {{ display: none; }}
</style>
</head>
<body>
<main>
  <div class="header custom-font">
    {logo}
    <h1>{title}</h1>
  </div>
  <div class="widget">
    <label for="description">{prompt}</label>
    <textarea id="description"></textarea>
    <button id="predict">{button}</button>
  </div>
  <div id="message" class="message" hidden></div>
  <section id="result" hidden>
    <p>{result_heading}</p>
    <h1 id="genre"></h1>
  </section>
  <section class="legend custom-font" id="legend" hidden>
    <p>{legend_heading}</p>
    <ul id="genres"></ul>
  </section>
</main>
<script id="ui-messages" type="application/json">{messages}</script>
<script src="/app.js"></script>
</body>
</html>
"#,
        title = title,
        background = escape_html(&ui.background),
        widget = escape_html(&ui.widget_background),
        input = escape_html(&ui.input_background),
        text = escape_html(&ui.text_color),
        logo = logo,
        prompt = escape_html(&ui.messages.prompt),
        button = escape_html(&ui.messages.button),
        result_heading = escape_html(&ui.messages.result_heading),
        legend_heading = escape_html(&ui.messages.legend_heading),
        messages = messages,
    )
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
