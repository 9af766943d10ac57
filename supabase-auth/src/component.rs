use crate::models::{LoginState, OAuthProvider};
use crate::service::SupabaseAuthService;
use dioxus::prelude::*;
use media_feed::Identity;

/// Props for the AuthButton
#[derive(Props, Clone, PartialEq)]
pub struct AuthButtonProps {
    pub service: SupabaseAuthService,
    /// Currently signed-in identity, `None` when signed out
    pub identity: Option<Identity>,
    /// Where the provider should send the browser after OAuth sign-in
    pub redirect_url: String,
    /// Custom labels for UI elements (optional)
    #[props(default)]
    pub labels: Option<AuthLabels>,
}

/// Custom labels for the sign-in menu
#[derive(Clone, PartialEq, Default)]
pub struct AuthLabels {
    pub sign_in: String,
    pub sign_out: String,
    pub continue_with: String,
    pub paste_redirect: String,
    pub complete_sign_in: String,
    pub email: String,
    pub password: String,
    pub password_sign_in: String,
    pub signing_in: String,
    pub error_title: String,
}

fn default_labels() -> AuthLabels {
    AuthLabels {
        sign_in: "Sign In".to_string(),
        sign_out: "Sign Out".to_string(),
        continue_with: "Continue with".to_string(),
        paste_redirect: "Paste the address you were redirected to".to_string(),
        complete_sign_in: "Complete sign-in".to_string(),
        email: "Email".to_string(),
        password: "Password".to_string(),
        password_sign_in: "Sign in with email".to_string(),
        signing_in: "Signing in...".to_string(),
        error_title: "Sign-in failed".to_string(),
    }
}

/// Avatar button with the sign-in / sign-out menu
///
/// Signed out, the menu offers the OAuth providers and an email/password
/// form. Signed in, it shows the account email and a sign-out entry. The
/// identity itself reaches the app through the service's identity stream.
#[component]
pub fn AuthButton(props: AuthButtonProps) -> Element {
    let mut menu_open = use_signal(|| false);
    let mut login_state = use_signal(|| LoginState::Idle);
    let mut email = use_signal(String::new);
    let mut password = use_signal(String::new);
    let mut redirect_input = use_signal(String::new);

    let labels = props.labels.clone().unwrap_or_else(default_labels);

    let start_oauth = {
        let service = props.service.clone();
        let redirect_url = props.redirect_url.clone();
        move |provider: OAuthProvider| match service.authorize_url(provider, &redirect_url) {
            Ok(authorize_url) => {
                log::info!("Opening {} sign-in", provider.label());
                login_state.set(LoginState::AwaitingRedirect {
                    provider,
                    authorize_url,
                });
            }
            Err(e) => {
                log::error!("Error signing in: {}", e);
                login_state.set(LoginState::Error(e.to_string()));
            }
        }
    };

    let complete_redirect = {
        let service = props.service.clone();
        move |_| {
            let service = service.clone();
            let redirect = redirect_input();
            login_state.set(LoginState::SigningIn);
            spawn(async move {
                match service.complete_oauth_redirect(redirect.trim()).await {
                    Ok(_) => {
                        login_state.set(LoginState::Idle);
                        redirect_input.set(String::new());
                        menu_open.set(false);
                    }
                    Err(e) => {
                        log::error!("Error completing sign-in: {}", e);
                        login_state.set(LoginState::Error(e.to_string()));
                    }
                }
            });
        }
    };

    let password_sign_in = {
        let service = props.service.clone();
        move |_| {
            let service = service.clone();
            let (address, secret) = (email(), password());
            login_state.set(LoginState::SigningIn);
            spawn(async move {
                match service.sign_in_with_password(address.trim(), &secret).await {
                    Ok(_) => {
                        login_state.set(LoginState::Idle);
                        password.set(String::new());
                        menu_open.set(false);
                    }
                    Err(e) => {
                        log::error!("Error signing in: {}", e);
                        login_state.set(LoginState::Error(e.to_string()));
                    }
                }
            });
        }
    };

    let sign_out = {
        let service = props.service.clone();
        move |_| {
            let service = service.clone();
            menu_open.set(false);
            spawn(async move {
                service.sign_out().await;
            });
        }
    };

    rsx! {
        div { class: "auth-button",
            match &props.identity {
                Some(identity) => {
                    let initial = identity.initial();
                    let account = identity.email.clone().unwrap_or_default();
                    rsx! {
                        button {
                            class: "avatar",
                            onclick: move |_| menu_open.toggle(),
                            if let Some(avatar) = identity.avatar_url.clone() {
                                img { src: "{avatar}", alt: "{account}" }
                            } else {
                                span { class: "avatar-initial", "{initial}" }
                            }
                        }
                        if menu_open() {
                            div { class: "auth-menu",
                                p { class: "auth-email", "{account}" }
                                button { class: "auth-menu-item", onclick: sign_out, "{labels.sign_out}" }
                            }
                        }
                    }
                }
                None => rsx! {
                    button {
                        class: "btn-primary",
                        onclick: move |_| menu_open.toggle(),
                        "{labels.sign_in}"
                    }
                    if menu_open() {
                        div { class: "auth-menu",
                            for provider in [OAuthProvider::Google, OAuthProvider::Github] {
                                button {
                                    key: "{provider.as_str()}",
                                    class: "auth-menu-item",
                                    onclick: {
                                        let mut start_oauth = start_oauth.clone();
                                        move |_| start_oauth(provider)
                                    },
                                    "{labels.continue_with} {provider.label()}"
                                }
                            }

                            match login_state() {
                                LoginState::AwaitingRedirect { provider, authorize_url } => rsx! {
                                    div { class: "auth-redirect",
                                        a {
                                            href: "{authorize_url}",
                                            target: "_blank",
                                            "{labels.continue_with} {provider.label()}"
                                        }
                                        input {
                                            r#type: "url",
                                            placeholder: "{labels.paste_redirect}",
                                            value: "{redirect_input}",
                                            oninput: move |e| redirect_input.set(e.value()),
                                        }
                                        button {
                                            class: "btn-primary",
                                            disabled: redirect_input().trim().is_empty(),
                                            onclick: complete_redirect.clone(),
                                            "{labels.complete_sign_in}"
                                        }
                                    }
                                },
                                LoginState::SigningIn => rsx! {
                                    p { class: "auth-status", "{labels.signing_in}" }
                                },
                                LoginState::Error(error) => rsx! {
                                    div { class: "auth-error",
                                        p { style: "margin: 0; font-weight: 600;", "{labels.error_title}" }
                                        p { style: "margin: 4px 0 0 0; font-size: 13px;", "{error}" }
                                    }
                                },
                                LoginState::Idle => rsx! {},
                            }

                            div { class: "auth-password",
                                input {
                                    r#type: "email",
                                    placeholder: "{labels.email}",
                                    value: "{email}",
                                    oninput: move |e| email.set(e.value()),
                                }
                                input {
                                    r#type: "password",
                                    placeholder: "{labels.password}",
                                    value: "{password}",
                                    oninput: move |e| password.set(e.value()),
                                }
                                button {
                                    class: "btn-primary",
                                    disabled: email().trim().is_empty() || password().is_empty(),
                                    onclick: password_sign_in.clone(),
                                    "{labels.password_sign_in}"
                                }
                            }
                        }
                    }
                },
            }
        }
    }
}
