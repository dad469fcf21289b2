use minijinja::{context, Environment};

const LINKED: &str = "linked.html";
const LINK_FAILED: &str = "link_failed.html";

// `.html` names turn on minijinja's auto-escaping for everything interpolated.
fn environment() -> Result<Environment<'static>, minijinja::Error> {
    let mut env = Environment::new();
    env.add_template(LINKED, include_str!("templates/linked.html"))?;
    env.add_template(LINK_FAILED, include_str!("templates/link_failed.html"))?;
    Ok(env)
}

pub fn linked() -> Result<String, minijinja::Error> {
    environment()?.get_template(LINKED)?.render(context! {})
}

/// Failure page showing the vendor's response body.
pub fn link_failed(detail: &str) -> Result<String, minijinja::Error> {
    environment()?
        .get_template(LINK_FAILED)?
        .render(context! { detail => detail })
}
