use wireup::annotation::Injectable;
use wireup::injector::create_injector;
use wireup::module::ModuleRegistry;
use wireup::service::service;

// note: for the sake of simplicity, errors are unwrapped, rather than
// gracefully handled
fn main() {
    // modules accumulate registrations before any injector exists
    let registry = ModuleRegistry::new();
    registry
        .module("greeter", &[])
        // constants are available unchanged to factories and consumers alike
        .constant("greeting", service("Hello".to_string()))
        // a factory declares its dependencies by name and receives them in
        // declared order
        .factory(
            "message",
            Injectable::new(["greeting"], |deps| {
                let greeting = deps[0].downcast_ref::<String>().unwrap();
                Ok(service(format!("{greeting}, world!")))
            }),
        );

    // creating the injector loads the requested modules; services are then
    // constructed lazily, at most once each
    let injector =
        create_injector(&registry, &["greeter"], false).expect("error creating the injector");

    let message = injector
        .get_typed::<String>("message")
        .expect("error resolving the message service");

    // prints "Hello, world!"
    println!("{message}");
}
