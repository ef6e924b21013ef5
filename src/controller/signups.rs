use actix_web::dev::HttpServiceFactory;
use actix_web::http::header::{self, ContentType};
use actix_web::{get, post, web, HttpRequest, HttpResponse, Responder};

use uuid::Uuid;

use crate::catalog::CatalogCache;
use crate::domain::{EventCatalog, SignupForm, SignupRequest, ValidationErrors};
use crate::error::{RestError, RestResult};
use crate::model::ClientMeta;
use crate::pipeline::{SignupPipeline, SubmitError};
use crate::rate_limit::{client_address, Admitted, ConfirmationScope, SubmitScope, ViewScope};
use crate::repo::SignupStore;
use crate::views;

/// Decode an urlencoded signup form; checkbox fields may repeat
fn parse_form(body: &[u8]) -> SignupForm {
    let mut form = SignupForm::default();
    for (key, value) in url::form_urlencoded::parse(body) {
        match key.as_ref() {
            "name" => form.name = value.into_owned(),
            "email" => form.email = value.into_owned(),
            "phone" => form.phone = value.into_owned(),
            "zip_code" => form.zip_code = value.into_owned(),
            "events_interested" => form.events_interested.push(value.into_owned()),
            _ => {}
        }
    }
    form
}

/// Tracking attributes captured once at submission
fn client_meta(req: &HttpRequest) -> ClientMeta {
    let header = |name: header::HeaderName| {
        req.headers()
            .get(name)
            .and_then(|value| value.to_str().ok())
    };

    ClientMeta::new(
        Some(client_address(req).as_str()),
        header(header::USER_AGENT),
        header(header::REFERER),
    )
}

fn html(body: String) -> HttpResponse {
    HttpResponse::Ok()
        .content_type(ContentType::html())
        .body(body)
}

fn rerender(
    catalog: &EventCatalog,
    form: &SignupForm,
    errors: Option<&ValidationErrors>,
    notice: Option<&str>,
) -> HttpResponse {
    html(views::signup_form(catalog, form, errors, notice))
}

/// Signup form
#[tracing::instrument(name = "Show signup form", skip_all)]
#[get("/")]
async fn show_form(_admitted: Admitted<ViewScope>, catalog: web::Data<CatalogCache>) -> impl Responder {
    html(catalog.form_page().await.to_string())
}

/// Signup submission endpoint
#[tracing::instrument(name = "Submit a new signup", skip_all)]
#[post("/signup")]
async fn create_signup(
    _admitted: Admitted<SubmitScope>,
    req: HttpRequest,
    body: web::Bytes,
    catalog: web::Data<CatalogCache>,
    pipeline: web::Data<SignupPipeline>,
) -> RestResult<HttpResponse> {
    let form = parse_form(&body);
    let catalog = catalog.catalog().await;

    let request = match SignupRequest::validate(&form, &catalog) {
        Ok(request) => request,
        Err(errors) => {
            tracing::info!(%errors, "Signup failed validation");
            return Ok(rerender(&catalog, &form, Some(&errors), None));
        }
    };

    match pipeline.submit(request, client_meta(&req)).await {
        Ok(id) => {
            let location = req.url_for("signup_success", [id.to_string()])?;
            Ok(HttpResponse::Found()
                .insert_header((header::LOCATION, location.as_str()))
                .finish())
        }
        Err(SubmitError::Duplicate) => Ok(rerender(
            &catalog,
            &form,
            None,
            Some(views::DUPLICATE_NOTICE),
        )),
        Err(e) => Err(e.into()),
    }
}

/// Signup confirmation page
#[tracing::instrument(name = "Show signup confirmation", skip(_admitted, signups))]
#[get("/success/{id}", name = "signup_success")]
async fn show_success(
    _admitted: Admitted<ConfirmationScope>,
    path: web::Path<(Uuid,)>,
    signups: web::Data<dyn SignupStore>,
) -> RestResult<HttpResponse> {
    let (id,) = path.into_inner();

    let record = signups.fetch_by_id(id).await?.ok_or(RestError::NotFound)?;

    Ok(html(views::success_page(&record)))
}

/// Signup form endpoints
pub fn services() -> impl HttpServiceFactory {
    (show_form, create_signup, show_success)
}
