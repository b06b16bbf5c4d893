//! Template rendering for [`Window::set_html`](crate::Window::set_html).

use serde::Serialize;
use tera::{Context, Tera};

/// Render the template `name` with `data` as its context.
///
/// `data` must serialize to a map, such as a struct or a JSON object.
/// Templates whose names end in `.html` are autoescaped.
pub fn render_html<T: Serialize>(
    tera: &Tera,
    name: &str,
    data: &T,
) -> Result<String, tera::Error> {
    let context = Context::from_serialize(data)?;
    tera.render(name, &context)
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    fn templates() -> Tera {
        let mut tera = Tera::default();
        tera.add_raw_template(
            "page.html",
            "<h1>{{ title }}</h1>{% for item in items %}<li>{{ item }}</li>{% endfor %}",
        )
        .unwrap();
        tera
    }

    #[test]
    fn test_render_named_template() {
        let data = json!({"title": "Hi", "items": ["a", "b"]});
        let html = render_html(&templates(), "page.html", &data).unwrap();
        assert_eq!(html, "<h1>Hi</h1><li>a</li><li>b</li>");
    }

    #[test]
    fn test_values_are_escaped() {
        let data = json!({"title": "<b>&", "items": []});
        let html = render_html(&templates(), "page.html", &data).unwrap();
        assert_eq!(html, "<h1>&lt;b&gt;&amp;</h1>");
    }

    #[test]
    fn test_struct_context() {
        #[derive(Serialize)]
        struct Page {
            title: &'static str,
            items: Vec<u32>,
        }
        let page = Page {
            title: "n",
            items: vec![1],
        };
        let html = render_html(&templates(), "page.html", &page).unwrap();
        assert_eq!(html, "<h1>n</h1><li>1</li>");
    }

    #[test]
    fn test_unknown_template_fails() {
        assert!(render_html(&templates(), "missing.html", &json!({})).is_err());
    }

    #[test]
    fn test_non_map_context_fails() {
        assert!(render_html(&templates(), "page.html", &5).is_err());
    }
}
