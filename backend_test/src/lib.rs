use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, spanned::Spanned, FnArg, ItemFn, Pat, Signature, Type};

/// Transform an asynchronous test into a synchronous one running on a
/// multi-threaded runtime, with test logging enabled and dependencies injected.
///
/// Injectable dependencies are a fresh [`crate::store::MemoryStore`] and a
/// [`rocket::local::asynchronous::Client`] for a server backed by that same store.
/// Either, both or neither may be requested, in any order.
///
/// Alternatively a test may take a [`crate::store::MongoStore`] on a fresh
/// database, which is dropped however the test terminates. Such tests are
/// skipped unless `test_db_uri` is configured.
#[proc_macro_attribute]
pub fn backend_test(_args: TokenStream, input: TokenStream) -> TokenStream {
    let mut item_fn = parse_macro_input!(input as ItemFn);

    // Extract the injected arguments and reject invalid function signatures.
    let (test_args, injected) = match check_sig(item_fn.sig.clone()) {
        Ok(args) => args,
        Err(err) => {
            return err.into_compile_error().into();
        }
    };

    // Rename the future so the test can have its original name.
    let name = item_fn.sig.ident.clone();
    let new_name = format_ident!("{}_fut", name);
    item_fn.sig.ident = new_name.clone();

    let run = match injected {
        Injected::Memory { client } => {
            let maybe_client = if client {
                quote! { let rocket_client = crate::test_client(&store).await; }
            } else {
                quote! {}
            };
            quote! {
                runtime.block_on(async {
                    #[allow(unused_variables)]
                    let store = crate::store::MemoryStore::new();
                    #maybe_client
                    #new_name(#(#test_args),*).await;
                });
            }
        }
        Injected::Mongo => quote! {
            // Run the setup.
            let (mongo_store, db) = match runtime.block_on(crate::test_mongo()) {
                Some(setup) => setup,
                None => {
                    eprintln!("skipping {}: `test_db_uri` is not configured", stringify!(#name));
                    return;
                }
            };

            // Run the test, catching any panics.
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                runtime.block_on(#new_name(#(#test_args),*));
            }));

            // Run the cleanup.
            runtime.block_on(async { db.drop(None).await.unwrap() });

            // If the test panicked, re-raise the panic.
            if let Err(cause) = result {
                std::panic::resume_unwind(cause);
            }
        },
    };

    // Rewrite the test function.
    quote! {
        #[test]
        fn #name() {
            /// The test itself.
            #item_fn

            log4rs_test_utils::test_logging::init_logging_once_for(
                ["campus_vote_backend"],
                None,
                None,
            );

            let runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("rocket-worker-test-thread")
                .worker_threads(2)
                .enable_all()
                .build()
                .unwrap();

            #run
        }
    }
    .into()
}

/// Which backing store the test runs against.
enum Injected {
    /// A fresh in-memory store, optionally behind a local client.
    Memory { client: bool },
    /// A store on a fresh MongoDB database.
    Mongo,
}

/// Ensure the wrapped test is async, map its parameters to the values to
/// inject, and reject unknown parameters.
fn check_sig(sig: Signature) -> Result<(Vec<TokenStream2>, Injected), syn::Error> {
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(sig.span(), "Test must be marked `async`"));
    }

    let mut has_client = false;
    let mut has_store = false;
    let mut has_mongo = false;
    let mut args = vec![];

    for input in &sig.inputs {
        if let FnArg::Typed(pat_type) = input {
            if let (Pat::Ident(_), Type::Path(type_path)) = (&*pat_type.pat, &*pat_type.ty) {
                // The last path segment names the type, however it was imported.
                if let Some(segment) = type_path.path.segments.last() {
                    if segment.ident == "Client" {
                        if has_client {
                            return Err(syn::Error::new(
                                input.span(),
                                "Test cannot accept more than one `rocket::local::asynchronous::Client`",
                            ));
                        }
                        has_client = true;
                        args.push(quote! { rocket_client });
                        continue;
                    } else if segment.ident == "MemoryStore" {
                        if has_store {
                            return Err(syn::Error::new(
                                input.span(),
                                "Test cannot accept more than one `MemoryStore`",
                            ));
                        }
                        has_store = true;
                        args.push(quote! { store.clone() });
                        continue;
                    } else if segment.ident == "MongoStore" {
                        if has_mongo {
                            return Err(syn::Error::new(
                                input.span(),
                                "Test cannot accept more than one `MongoStore`",
                            ));
                        }
                        has_mongo = true;
                        args.push(quote! { mongo_store.clone() });
                        continue;
                    }
                }
            }
        }

        return Err(syn::Error::new(
            input.span(),
            "Expected one of `client_ident: Client`, `store_ident: MemoryStore` or `store_ident: MongoStore`",
        ));
    }

    if has_mongo {
        if has_client || has_store {
            return Err(syn::Error::new(
                sig.span(),
                "A test on `MongoStore` cannot also take a `Client` or `MemoryStore`",
            ));
        }
        return Ok((args, Injected::Mongo));
    }
    Ok((args, Injected::Memory { client: has_client }))
}
