use wireup::annotation::{Injectable, Token};
use wireup::injector::create_injector;
use wireup::module::ModuleRegistry;
use wireup::provider::{ProviderSpec, GET_SLOT};
use wireup::service::service;

// A constructor-style provider builds a record at the provider tier. The
// record holds configuration state and the `$get` factory which produces the
// eventual instance; the factory reads the record through its receiver.
fn endpoint_provider() -> ProviderSpec {
    ProviderSpec::Constructor(Injectable::with_receiver(
        ["defaultPort"],
        |record, deps| {
            let record = record.expect("constructor receiver");
            record.set("port", deps[0].clone());
            record.set(
                GET_SLOT,
                service(Injectable::with_receiver(
                    Vec::<Token>::new(),
                    |record, _| {
                        let port = record
                            .expect("factory receiver")
                            .get_typed::<u16>("port")
                            .expect("configured port");
                        Ok(service(format!("127.0.0.1:{port}")))
                    },
                )),
            );
            Ok(service(()))
        },
    ))
}

// note: for the sake of simplicity, errors are unwrapped, rather than
// gracefully handled
fn main() {
    let registry = ModuleRegistry::new();
    registry
        .module("network", &[])
        .constant("defaultPort", service(8080u16))
        .provider("endpoint", endpoint_provider())
        // configuration blocks run after all registrations of the module,
        // with full dependency injection
        .config(Injectable::new(["endpoint"], |deps| {
            let endpoint = deps[0].downcast_ref::<String>().unwrap();
            println!("configured endpoint: {endpoint}");
            Ok(service(()))
        }));

    let injector =
        create_injector(&registry, &["network"], false).expect("error creating the injector");

    // the instance was already constructed for the configuration block and
    // is reused here
    let endpoint = injector
        .get_typed::<String>("endpoint")
        .expect("error resolving the endpoint service");
    println!("resolved endpoint:   {endpoint}");
}
